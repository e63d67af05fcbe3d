//! Command dispatch for the `sc` binary.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::CommandFactory;
use config_store::{parse_assignment, ConfigStore};
use chat_provider::image_mime_type;
use sc_term::{
    install_signal_handlers, stdin_is_terminal, stdout_is_terminal, terminate_with_default,
    EditorInput, EnvConfig, OutputHandle, ProcessTerminal, PromptCompleter, SavedTerminalMode,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cli::{ChatArgs, Cli, Command, ConfigCommand};
use crate::commands::COMMAND_NAMES;
use crate::consumer::{StreamConsumer, StreamOutcome};
use crate::coordinator::SessionCoordinator;
use crate::prompt::parse_prompt;
use crate::providers::{provider_for_selection, resolve_selection};
use crate::repl::{Repl, ReplExit};
use crate::signals::{SignalAction, SignalRouter};

/// Exit status used when a response was cancelled by Ctrl-C.
const INTERRUPTED_EXIT: u8 = 130;

pub fn run(cli: Cli, env: &EnvConfig) -> io::Result<ExitCode> {
    let store = ConfigStore::open(env.config_dir.as_deref()).map_err(io::Error::other)?;

    match &cli.command {
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Config(command)) => {
            run_config(&store, command, &mut io::stdout().lock())?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Chat(args)) => run_chat(&cli, args, &store, env),
    }
}

/// Runs a `sc config` subcommand, printing results to `out`.
pub fn run_config(
    store: &ConfigStore,
    command: &ConfigCommand,
    out: &mut dyn Write,
) -> io::Result<()> {
    match command {
        ConfigCommand::Init => {
            let path = store.init().map_err(io::Error::other)?;
            writeln!(out, "Initialized config at {}", path.display())?;
        }
        ConfigCommand::List => {
            for (key, value) in store.list().map_err(io::Error::other)? {
                writeln!(out, "{key}={value}")?;
            }
        }
        ConfigCommand::Get { key } => match store.get(key).map_err(io::Error::other)? {
            Some(value) => writeln!(out, "{value}")?,
            None => return Err(io::Error::other(format!("config key '{key}' is not set"))),
        },
        ConfigCommand::Set { assignments } => {
            let values = assignments
                .iter()
                .map(|assignment| parse_assignment(assignment))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map_err(io::Error::other)?;
            store.set(&values).map_err(io::Error::other)?;
        }
        ConfigCommand::Unset { keys } => store.unset(keys.as_slice()).map_err(io::Error::other)?,
        ConfigCommand::Dir => writeln!(out, "{}", store.dir().display())?,
    }
    Ok(())
}

fn run_chat(
    cli: &Cli,
    args: &ChatArgs,
    store: &ConfigStore,
    env: &EnvConfig,
) -> io::Result<ExitCode> {
    let config = store.load().map_err(io::Error::other)?;
    let selection = resolve_selection(&cli.overrides(args.model.as_deref()), &config);
    let provider = provider_for_selection(&selection).map_err(io::Error::other)?;

    let interactive = args.message.is_none() && stdin_is_terminal();
    let coordinator = Arc::new(SessionCoordinator::new());
    let shutdown = Arc::new(AtomicBool::new(false));
    let router = Arc::new(SignalRouter::new(
        Arc::clone(&coordinator),
        Arc::clone(&shutdown),
        interactive,
    ));
    let terminal_mode = Arc::new(SavedTerminalMode::capture());
    let _signals = install_signal_handlers(
        {
            let router = Arc::clone(&router);
            let terminal_mode = Arc::clone(&terminal_mode);
            move |signal| {
                if router.on_interrupt() == SignalAction::Terminate {
                    exit_on_signal(signal, (*terminal_mode).as_ref());
                }
            }
        },
        {
            let router = Arc::clone(&router);
            let terminal_mode = Arc::clone(&terminal_mode);
            move |signal| {
                if router.on_terminate() == SignalAction::Terminate {
                    exit_on_signal(signal, (*terminal_mode).as_ref());
                }
            }
        },
    )?;

    let consumer = StreamConsumer::new(
        provider,
        coordinator,
        OutputHandle::new(ProcessTerminal::new()),
    )
    .with_spinner(spinner_enabled(env, stdout_is_terminal()));
    let conversation_id = Uuid::new_v4().to_string();
    let base_dir = std::env::current_dir()?;
    info!(conversation_id = %conversation_id, provider = %selection.provider_id, "chat session started");

    let message = match &args.message {
        Some(message) => Some(message.clone()),
        None if !interactive => {
            let mut piped = String::new();
            io::stdin().read_to_string(&mut piped)?;
            Some(piped)
        }
        None => None,
    };

    if let Some(message) = message {
        let outcome = send_message(&consumer, &conversation_id, &message, &base_dir)?;
        return Ok(exit_code_for(&outcome));
    }

    let completer = PromptCompleter::new(base_dir.clone())
        .with_commands(COMMAND_NAMES)
        .with_file_filter(|path| image_mime_type(path).is_some());
    let input = EditorInput::new(Some(&store.history_path()), completer)?;
    let exit = Repl::new(input, consumer, conversation_id, base_dir)
        .with_shutdown_flag(shutdown)
        .run()?;
    debug!(exit = ?exit, "interactive session ended");

    Ok(match exit {
        ReplExit::Quit | ReplExit::Eof | ReplExit::Shutdown => ExitCode::SUCCESS,
        ReplExit::Interrupted => ExitCode::from(INTERRUPTED_EXIT),
    })
}

/// Ends the process for a signal nothing in flight handled.
fn exit_on_signal(signal: i32, terminal_mode: Option<&SavedTerminalMode>) -> ! {
    if let Err(error) = terminate_with_default(signal, terminal_mode) {
        warn!(signal, error = %error, "default signal action failed");
    }
    std::process::exit(128 + signal);
}

/// The spinner draws with carriage returns, which only make sense on a tty.
fn spinner_enabled(env: &EnvConfig, stdout_tty: bool) -> bool {
    stdout_tty && !env.no_spinner
}

/// Sends one non-interactive message.
///
/// A message with no text and no attachments is rejected before anything
/// is sent.
pub fn send_message(
    consumer: &StreamConsumer,
    conversation_id: &str,
    message: &str,
    base_dir: &Path,
) -> io::Result<StreamOutcome> {
    let prompt = parse_prompt(message, base_dir);
    if prompt.text.is_empty() && prompt.images.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "message is empty"));
    }
    Ok(consumer.consume(conversation_id, None, prompt))
}

pub fn exit_code_for(outcome: &StreamOutcome) -> ExitCode {
    ExitCode::from(exit_status(outcome))
}

fn exit_status(outcome: &StreamOutcome) -> u8 {
    match outcome {
        StreamOutcome::Completed => 0,
        StreamOutcome::Failed(_) => 1,
        StreamOutcome::Cancelled | StreamOutcome::Interrupted => INTERRUPTED_EXIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Discard;

    impl sc_term::Terminal for Discard {
        fn write(&mut self, _data: &str) {}

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn columns(&self) -> u16 {
            80
        }
    }

    fn run_to_string(store: &ConfigStore, command: ConfigCommand) -> io::Result<String> {
        let mut out = Vec::new();
        run_config(store, &command, &mut out)?;
        Ok(String::from_utf8(out).expect("config output is UTF-8"))
    }

    #[test]
    fn config_commands_round_trip_through_the_store() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = ConfigStore::new(dir.path().join(".sc"));

        let init = run_to_string(&store, ConfigCommand::Init).expect("init succeeds");
        assert!(init.starts_with("Initialized config at "));

        run_to_string(
            &store,
            ConfigCommand::Set {
                assignments: vec![
                    "provider=mock".to_string(),
                    "providers.ollama.model=llava".to_string(),
                ],
            },
        )
        .expect("set succeeds");

        assert_eq!(
            run_to_string(&store, ConfigCommand::List).expect("list succeeds"),
            "provider=mock\nproviders.ollama.model=llava\n"
        );
        assert_eq!(
            run_to_string(
                &store,
                ConfigCommand::Get {
                    key: "provider".to_string()
                }
            )
            .expect("get succeeds"),
            "mock\n"
        );

        run_to_string(
            &store,
            ConfigCommand::Unset {
                keys: vec!["provider".to_string()],
            },
        )
        .expect("unset succeeds");
        assert!(run_to_string(
            &store,
            ConfigCommand::Get {
                key: "provider".to_string()
            }
        )
        .is_err());
    }

    #[test]
    fn invalid_set_is_reported_and_rolled_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = ConfigStore::new(dir.path());
        store.init().expect("init succeeds");

        let error = run_to_string(
            &store,
            ConfigCommand::Set {
                assignments: vec!["provider=bedrock".to_string()],
            },
        )
        .expect_err("unknown provider should be rejected");

        assert!(error.to_string().contains("bedrock"));
        assert_eq!(run_to_string(&store, ConfigCommand::List).expect("list succeeds"), "");
    }

    #[test]
    fn empty_message_is_rejected_without_contacting_the_provider() {
        let provider = Arc::new(chat_provider_mock::MockProvider::new(vec![
            "unused".to_string(),
        ]));
        let consumer = StreamConsumer::new(
            provider.clone(),
            Arc::new(SessionCoordinator::new()),
            OutputHandle::new(Discard),
        );

        let error = send_message(&consumer, "conversation", "  \n\t ", Path::new("."))
            .expect_err("blank input should be rejected");

        assert_eq!(error.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(error.to_string(), "message is empty");
        assert_eq!(provider.streams_opened(), 0);
    }

    #[test]
    fn spinner_needs_a_terminal_and_no_opt_out() {
        let env = EnvConfig::default();
        assert!(spinner_enabled(&env, true));
        assert!(!spinner_enabled(&env, false));

        let opted_out = EnvConfig {
            no_spinner: true,
            ..EnvConfig::default()
        };
        assert!(!spinner_enabled(&opted_out, true));
    }

    #[test]
    fn outcomes_map_to_exit_statuses() {
        assert_eq!(exit_status(&StreamOutcome::Completed), 0);
        assert_eq!(exit_status(&StreamOutcome::Failed("boom".to_string())), 1);
        assert_eq!(exit_status(&StreamOutcome::Cancelled), 130);
        assert_eq!(exit_status(&StreamOutcome::Interrupted), 130);
    }
}
