//! Shell completion generation for wfs-export
//!
//! This module provides functionality to generate shell completion scripts
//! for bash, zsh, fish, PowerShell and elvish. Bash, zsh and fish scripts
//! additionally complete the projection flags with common EPSG codes.

use clap::CommandFactory;
use clap_complete::{Shell, generate};

use crate::cli::CliArgs;
use crate::error::{ConfigError, Result};

/// Binary name completions are generated for
const BIN_NAME: &str = "wfs-export";

/// Codes offered for `--source-projection` and `--native-projection`
pub const SUGGESTED_PROJECTIONS: &[&str] = &[
    "EPSG:4326",
    "EPSG:3857",
    "EPSG:4258",
    "EPSG:25832",
    "EPSG:25833",
    "EPSG:32632",
    "EPSG:32633",
];

/// Generate a shell completion script and print it to stdout
///
/// # Arguments
/// * `shell_name` - Shell type (bash, zsh, fish, powershell, elvish)
///
/// # Returns
/// * `Result<()>` - Success or error
pub fn generate_completion(shell_name: &str) -> Result<()> {
    print!("{}", render_completion(shell_name)?);
    Ok(())
}

/// Render a shell completion script
pub fn render_completion(shell_name: &str) -> Result<String> {
    let shell = parse_shell(shell_name)?;

    let mut cmd = CliArgs::command();
    let mut buffer = Vec::new();
    generate(shell, &mut cmd, BIN_NAME, &mut buffer);
    let basic_completion = String::from_utf8_lossy(&buffer).into_owned();

    let codes = SUGGESTED_PROJECTIONS.join(" ");
    let script = match shell {
        Shell::Bash => format!(
            r#"{basic_completion}
# Projection code completion
_wfs_export_original="$(complete -p wfs-export 2>/dev/null | sed -E 's/.*-F ([^ ]+).*/\1/')"

_wfs_export_enhanced() {{
    local cur prev
    cur="${{COMP_WORDS[COMP_CWORD]}}"
    prev="${{COMP_WORDS[COMP_CWORD-1]}}"

    if [[ "$prev" == "--source-projection" || "$prev" == "--native-projection" ]]; then
        COMPREPLY=($(compgen -W "{codes}" -- "$cur"))
        return 0
    fi

    "$_wfs_export_original" "$@"
}}

complete -F _wfs_export_enhanced -o bashdefault -o default wfs-export
"#
        ),
        Shell::Zsh => format!(
            r#"{basic_completion}
# Projection code completion
_wfs_export_original=${{_comps[wfs-export]:-_wfs-export}}

_wfs_export_enhanced() {{
    if [[ ${{words[CURRENT-1]}} == "--source-projection" || ${{words[CURRENT-1]}} == "--native-projection" ]]; then
        local -a codes
        codes=({codes})
        _describe 'projections' codes
        return 0
    fi

    $_wfs_export_original "$@"
}}

compdef _wfs_export_enhanced wfs-export
"#
        ),
        Shell::Fish => format!(
            r#"{basic_completion}
# Projection code completion
complete -c wfs-export -l source-projection -f -a "{codes}" -d "Projection of retrieved coordinates"
complete -c wfs-export -l native-projection -f -a "{codes}" -d "Native projection of the layer"
"#
        ),
        _ => basic_completion,
    };

    Ok(script)
}

/// Parse shell name string to Shell enum
fn parse_shell(shell_name: &str) -> Result<Shell> {
    match shell_name.to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        "powershell" | "pwsh" => Ok(Shell::PowerShell),
        "elvish" => Ok(Shell::Elvish),
        _ => Err(ConfigError::InvalidValue {
            field: "shell".to_string(),
            value: format!("{shell_name} (supported: bash, zsh, fish, powershell, elvish)"),
        }
        .into()),
    }
}
