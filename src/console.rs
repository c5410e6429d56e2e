//! Line-oriented terminal front end

use crate::peer::{GuestCommand, HostCommand};
use crate::state::SessionView;
use crate::types::*;
use crate::words;
use std::fmt::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start {
        theme: Option<String>,
        imposters: Option<usize>,
    },
    Vote(String),
    /// Host reveals the leader, or a named player
    Reveal(Option<String>),
    Lobby,
    Say(String),
    Who,
    Help,
    Quit,
}

pub const HELP: &str = "commands: start [theme] [imposters] | vote <name or #> | reveal [name or #] | lobby | say <text> | who | quit";

pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match word.to_ascii_lowercase().as_str() {
        "start" => {
            let mut theme = None;
            let mut imposters = None;
            for arg in rest.split_whitespace() {
                match arg.parse::<usize>() {
                    Ok(n) => imposters = Some(n),
                    Err(_) => theme = Some(arg.to_string()),
                }
            }
            Ok(ConsoleCommand::Start { theme, imposters })
        }
        "vote" if !rest.is_empty() => Ok(ConsoleCommand::Vote(rest.to_string())),
        "vote" => Err("vote for whom?".to_string()),
        "reveal" => Ok(ConsoleCommand::Reveal(
            (!rest.is_empty()).then(|| rest.to_string()),
        )),
        "lobby" => Ok(ConsoleCommand::Lobby),
        "say" if !rest.is_empty() => Ok(ConsoleCommand::Say(rest.to_string())),
        "say" => Err("say what?".to_string()),
        "who" => Ok(ConsoleCommand::Who),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        "" => Err(String::new()),
        other => Err(format!("unknown command: {}", other)),
    }
}

/// Resolve a nickname or 1-based candidate number to a player id
pub fn resolve_player(view: &SessionView, name: &str) -> Option<PlayerId> {
    let candidates = view
        .game
        .as_ref()
        .map(|g| g.players.as_slice())
        .unwrap_or(&view.players);

    if let Ok(n) = name.trim_start_matches('#').parse::<usize>() {
        return candidates.get(n.checked_sub(1)?).map(|p| p.id.clone());
    }
    candidates
        .iter()
        .find(|p| p.nickname.eq_ignore_ascii_case(name.trim()))
        .map(|p| p.id.clone())
}

fn nickname_of<'a>(view: &'a SessionView, id: &'a str) -> &'a str {
    view.game
        .as_ref()
        .and_then(|g| g.players.iter().find(|p| p.id == id))
        .or_else(|| view.players.iter().find(|p| p.id == id))
        .map(|p| p.nickname.as_str())
        .unwrap_or(id)
}

/// Render the session for the terminal
pub fn render(view: &SessionView) -> String {
    let mut out = String::new();

    if view.connection == ConnectionState::Error {
        let _ = writeln!(out, "!! {}", view.error.as_deref().unwrap_or("Connection error."));
        return out;
    }

    let role = if view.is_host { "host" } else { "guest" };
    let _ = writeln!(
        out,
        "== Room {} | {} ({}) | {:?}",
        view.room_code, view.nickname, role, view.phase
    );

    match view.phase {
        GamePhase::Lobby => {
            let _ = writeln!(out, "Players ({}):", view.players.len());
            for p in &view.players {
                let tag = if p.is_host { " [host]" } else { "" };
                let _ = writeln!(out, "  {} {}{}", p.emoji(), p.nickname, tag);
            }
            if view.is_host {
                if view.players.len() < MIN_PLAYERS {
                    let _ = writeln!(out, "Waiting for at least {} players...", MIN_PLAYERS);
                } else {
                    let themes: Vec<_> = words::theme_names().collect();
                    let _ = writeln!(out, "Ready: start [{}] [1-2]", themes.join("|"));
                }
            } else {
                let _ = writeln!(out, "Host is choosing settings...");
            }
        }
        GamePhase::Reveal => {
            if let Some(game) = &view.game {
                let _ = writeln!(out, "Theme: {}", game.theme);
                match game.role {
                    SecretRole::Imposter => {
                        let _ = writeln!(out, "You are the IMPOSTER. Blend in!");
                    }
                    SecretRole::Citizen => {
                        let _ = writeln!(out, "Secret word: {}", game.word);
                    }
                }
                let _ = writeln!(out, "{} speaks first.", game.starting_player_nickname);
            }
        }
        GamePhase::Voting => {
            let _ = writeln!(out, "Cast your vote:");
            let candidates = view.game.as_ref().map(|g| g.players.as_slice()).unwrap_or(&[]);
            for (i, p) in candidates.iter().enumerate() {
                let votes = view
                    .votes
                    .as_ref()
                    .and_then(|v| v.get(&p.id))
                    .map(|c| format!(" ({})", c))
                    .unwrap_or_default();
                let _ = writeln!(out, "  #{} {} {}{}", i + 1, p.emoji(), p.nickname, votes);
            }
            if let Some(received) = view.votes_received {
                let _ = writeln!(out, "Votes received: {} / {}", received, view.players.len());
            }
            let hint = if view.has_voted {
                "Wait for host to reveal result..."
            } else {
                "Select a suspect: vote <name or #>"
            };
            let _ = writeln!(out, "{}", hint);
        }
        GamePhase::Result => {
            if let Some(over) = &view.game_over {
                let headline = match over.winner {
                    Winner::Citizens => "Civilians win!",
                    Winner::Imposters => "Imposters win!",
                };
                let _ = writeln!(out, "{}", headline);
                let _ = writeln!(out, "Secret word: {}", over.secret_word);
                let _ = writeln!(out, "Imposters: {}", over.imposters.join(", "));
            }
        }
    }

    if let Some(line) = view.chat.last() {
        let _ = writeln!(out, "<{}> {}", line.from, line.text);
    }
    if let Some(error) = &view.error {
        let _ = writeln!(out, "!! {}", error);
    }
    out
}

/// Where parsed commands go
pub enum CommandSink {
    Host {
        commands: mpsc::UnboundedSender<HostCommand>,
        defaults: GameSettings,
    },
    Guest(mpsc::UnboundedSender<GuestCommand>),
}

impl CommandSink {
    /// Translate and forward one console command. Returns false on quit.
    fn dispatch(&self, command: ConsoleCommand, view: &SessionView) -> bool {
        match (self, command) {
            (_, ConsoleCommand::Help) => println!("{}", HELP),
            (_, ConsoleCommand::Who) => {
                for p in &view.players {
                    println!("  #{} {} {}", p.join_index, p.emoji(), p.nickname);
                }
            }
            (CommandSink::Host { commands, .. }, ConsoleCommand::Quit) => {
                let _ = commands.send(HostCommand::Leave);
                return false;
            }
            (CommandSink::Guest(commands), ConsoleCommand::Quit) => {
                let _ = commands.send(GuestCommand::Leave);
                return false;
            }
            (CommandSink::Host { commands, defaults }, ConsoleCommand::Start { theme, imposters }) => {
                let settings = GameSettings {
                    theme: theme.unwrap_or_else(|| defaults.theme.clone()),
                    imposter_count: imposters.unwrap_or(defaults.imposter_count),
                };
                let _ = commands.send(HostCommand::StartGame(settings));
            }
            (CommandSink::Host { commands, .. }, ConsoleCommand::Vote(name)) => {
                match resolve_player(view, &name) {
                    Some(id) => {
                        let _ = commands.send(HostCommand::CastVote(id));
                    }
                    None => println!("!! no player named {}", name),
                }
            }
            (CommandSink::Guest(commands), ConsoleCommand::Vote(name)) => {
                match resolve_player(view, &name) {
                    Some(id) => {
                        let _ = commands.send(GuestCommand::CastVote(id));
                    }
                    None => println!("!! no player named {}", name),
                }
            }
            (CommandSink::Host { commands, .. }, ConsoleCommand::Reveal(name)) => {
                if view.phase != GamePhase::Voting {
                    let _ = commands.send(HostCommand::InitiateVote);
                } else {
                    let target = match name {
                        Some(n) => match resolve_player(view, &n) {
                            Some(id) => Some(id),
                            None => {
                                println!("!! no player named {}", n);
                                return true;
                            }
                        },
                        None => None,
                    };
                    if let Some(id) = &target {
                        println!("Revealing {}...", nickname_of(view, id));
                    }
                    let _ = commands.send(HostCommand::FinalizeVote(target));
                }
            }
            (CommandSink::Host { commands, .. }, ConsoleCommand::Lobby) => {
                let _ = commands.send(HostCommand::BackToLobby);
            }
            (CommandSink::Host { commands, .. }, ConsoleCommand::Say(text)) => {
                let _ = commands.send(HostCommand::Say(text));
            }
            (CommandSink::Guest(commands), ConsoleCommand::Say(text)) => {
                let _ = commands.send(GuestCommand::Say(text));
            }
            (CommandSink::Guest(_), _) => println!("!! only the host can do that"),
        }
        true
    }
}

/// Read commands from stdin and print every view change until quit or session end
pub async fn run(mut views: watch::Receiver<SessionView>, sink: CommandSink) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print!("{}", render(&views.borrow_and_update()));
    println!("{}", HELP);

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                print!("{}", render(&view));
                if view.connection == ConnectionState::Error {
                    break;
                }
            }

            line = lines.next_line() => {
                let Ok(Some(line)) = line else {
                    break;
                };
                let view = views.borrow().clone();
                match parse_command(&line) {
                    Ok(command) => {
                        if !sink.dispatch(command, &view) {
                            break;
                        }
                    }
                    Err(e) if e.is_empty() => {}
                    Err(e) => println!("!! {}", e),
                }
            }
        }
    }
}
