use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};

const ARGS_TOKEN: &str = "token";
const ARGS_GENERATE: &str = "generate";
const ARGS_LENGTH: &str = "length";
const ARGS_DESCRIPTION: &str = "description";
const ARGS_SERVICE: &str = "service";
const ARGS_DOMAIN: &str = "domain";
const ARGS_A: &str = "a";
const ARGS_AAAA: &str = "aaaa";

pub const CMD_SERVE: &str = "serve";
pub const CMD_ADD: &str = "add";
pub const CMD_REMOVE: &str = "remove";

const DEFAULT_TOKEN_LENGTH: usize = 32;

/// What the process was asked to do
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Serve,
    Add(AddArgs),
    Remove { token: String },
}

/// Inputs of a whitelist upsert; empty strings mean "not given"
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AddArgs {
    /// `None` asks for a freshly generated token of `length` characters
    pub token: Option<String>,
    pub length: usize,
    pub description: String,
    pub service: String,
    pub domain: String,
    pub a: String,
    pub aaaa: String,
}

fn text_arg(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .help(help)
        .num_args(1)
        .value_name("VALUE")
        .long(long)
}

pub fn build_cli_args() -> Command {
    Command::new("ddns-center")
        .about("DDNS watchdog center server")
        .version(ddns_core::http::VERSION)
        .subcommand(Command::new(CMD_SERVE).about("Run the HTTP server (default)"))
        .subcommand(
            Command::new(CMD_ADD)
                .about("Add or update a whitelist entry")
                .arg(text_arg(ARGS_TOKEN, "token", "Token of the entry").short('t'))
                .arg(
                    Arg::new(ARGS_GENERATE)
                        .help("Generate a random token for a new entry")
                        .action(ArgAction::SetTrue)
                        .short('g')
                        .long("generate")
                        .conflicts_with(ARGS_TOKEN),
                )
                .arg(
                    Arg::new(ARGS_LENGTH)
                        .help("Length of a generated token")
                        .num_args(1)
                        .value_name("LENGTH")
                        .value_parser(value_parser!(usize))
                        .default_value("32")
                        .long("length"),
                )
                .arg(text_arg(ARGS_DESCRIPTION, "description", "Free-form note"))
                .arg(text_arg(
                    ARGS_SERVICE,
                    "service",
                    "dnspod, alidns, cloudflare or huaweicloud",
                ))
                .arg(text_arg(ARGS_DOMAIN, "domain", "Domain managed for this token"))
                .arg(text_arg(ARGS_A, "a", "Subdomain of the A record"))
                .arg(text_arg(ARGS_AAAA, "aaaa", "Subdomain of the AAAA record")),
        )
        .subcommand(
            Command::new(CMD_REMOVE)
                .about("Remove a whitelist entry")
                .arg(
                    text_arg(ARGS_TOKEN, "token", "Token of the entry")
                        .short('t')
                        .required(true),
                ),
        )
}

fn string(args: &ArgMatches, id: &str) -> String {
    args.get_one::<String>(id).cloned().unwrap_or_default()
}

pub fn parse_matches(args: &ArgMatches) -> anyhow::Result<Action> {
    match args.subcommand() {
        None | Some((CMD_SERVE, _)) => Ok(Action::Serve),
        Some((CMD_ADD, sub)) => {
            let token = if sub.get_flag(ARGS_GENERATE) {
                None
            } else {
                match sub.get_one::<String>(ARGS_TOKEN) {
                    Some(token) => Some(token.clone()),
                    None => anyhow::bail!("either --token or --generate is required"),
                }
            };
            Ok(Action::Add(AddArgs {
                token,
                length: sub
                    .get_one::<usize>(ARGS_LENGTH)
                    .copied()
                    .unwrap_or(DEFAULT_TOKEN_LENGTH),
                description: string(sub, ARGS_DESCRIPTION),
                service: string(sub, ARGS_SERVICE),
                domain: string(sub, ARGS_DOMAIN),
                a: string(sub, ARGS_A),
                aaaa: string(sub, ARGS_AAAA),
            }))
        }
        Some((CMD_REMOVE, sub)) => Ok(Action::Remove {
            token: string(sub, ARGS_TOKEN),
        }),
        Some((other, _)) => anyhow::bail!("unknown command {}", other),
    }
}

pub fn parse_clap() -> anyhow::Result<Action> {
    parse_matches(&build_cli_args().get_matches())
}
