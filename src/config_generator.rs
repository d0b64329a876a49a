//! Generates an Icinga2 `CheckCommand` definition from the command line definition, so the
//! check can be wired into icinga without writing the command object by hand.

use clap::{ArgAction, Command};

/// Set this environment variable to make the binary print its command definition and exit.
pub const GENERATE_ENV: &str = "GENERATE_ICINGA_COMMAND";

#[derive(Debug, thiserror::Error)]
pub enum ConfigGeneratorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid executable path")]
    InvalidExecutablePath,
    #[error("argument '{0}' has no long name")]
    MissingLongArgument(String),
}

#[derive(Debug, PartialEq)]
struct CommandArgument {
    flag: String,
    var: String,
    description: Option<String>,
    is_flag: bool,
    required: bool,
    default_value: Option<String>,
}

#[derive(Debug)]
pub struct IcingaCommand {
    name: String,
    arguments: Vec<CommandArgument>,
}

impl IcingaCommand {
    /// Collects one argument per option of `cmd`. Custom vars are prefixed with `name`.
    pub fn from_command(name: &str, cmd: &Command) -> Result<Self, ConfigGeneratorError> {
        let prefix = name.replace('-', "_");
        let mut arguments = Vec::new();

        for arg in cmd.get_arguments() {
            let action = arg.get_action();
            if matches!(
                action,
                ArgAction::Help | ArgAction::HelpShort | ArgAction::HelpLong | ArgAction::Version
            ) {
                continue;
            }

            let long = arg
                .get_long()
                .ok_or_else(|| ConfigGeneratorError::MissingLongArgument(arg.get_id().to_string()))?;
            let is_flag = !action.takes_values();

            let default_value = if is_flag {
                None
            } else {
                arg.get_default_values()
                    .first()
                    .and_then(|v| v.to_str())
                    .map(|s| s.to_owned())
            };

            arguments.push(CommandArgument {
                flag: format!("--{}", long),
                var: format!("{}_{}", prefix, long.replace('-', "_")),
                description: arg.get_help().map(|s| s.to_string()),
                is_flag,
                required: arg.is_required_set(),
                default_value,
            });
        }

        Ok(IcingaCommand {
            name: name.to_owned(),
            arguments,
        })
    }

    pub fn render(&self, executable: &str) -> String {
        let mut out = format!("object CheckCommand \"{}\" {{\n", escape_string(&self.name));
        out.push_str(&format!("  command = [ \"{}\" ]\n", escape_string(executable)));
        out.push_str("  arguments = {\n");

        for arg in &self.arguments {
            out.push_str(&format!("    \"{}\" = {{\n", arg.flag));

            if arg.is_flag {
                out.push_str(&format!("      set_if = \"${}$\"\n", arg.var));
            } else {
                out.push_str(&format!("      value = \"${}$\"\n", arg.var));
            }

            if let Some(description) = &arg.description {
                out.push_str(&format!(
                    "      description = \"{}\"\n",
                    escape_string(description)
                ));
            }

            if arg.required {
                out.push_str("      required = true\n");
            }

            out.push_str("    }\n");
        }

        out.push_str("  }\n");

        let defaults: Vec<String> = self
            .arguments
            .iter()
            .filter_map(|arg| {
                arg.default_value
                    .as_ref()
                    .map(|value| format!("  vars.{} = \"{}\"\n", arg.var, escape_string(value)))
            })
            .collect();

        if !defaults.is_empty() {
            out.push('\n');
            out.push_str(&defaults.concat());
        }

        out.push_str("}\n");
        out
    }
}

/// Backslash escapes quotes, doubles `$` so icinga does not treat it as a macro.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "$$")
}

/// Print the Icinga command configuration if the GENERATE_ICINGA_COMMAND environment variable
/// is set and exit the process.
pub fn print_icinga_command_config_if_env_and_exit(
    name: &str,
    cmd: &Command,
) -> Result<(), ConfigGeneratorError> {
    if std::env::var_os(GENERATE_ENV).is_none() {
        return Ok(());
    }

    let executable = std::env::current_exe()?;
    let executable = executable
        .to_str()
        .ok_or(ConfigGeneratorError::InvalidExecutablePath)?;

    let command = IcingaCommand::from_command(name, cmd)?;
    println!("{}", command.render(executable).trim());
    std::process::exit(0);
}
