use std::sync::Arc;

use chatline_lib::api::{ApiClient, ChatBackend};
use chatline_lib::config::ClientConfig;
use chatline_lib::display::{chat_title, format_time, preview_line, sender_label};
use chatline_lib::error::ValidationError;
use chatline_lib::models::input::{AvatarUpload, ProfileUpdate};
use chatline_lib::models::{Identity, Message};
use chatline_lib::realtime::ChannelManager;
use chatline_lib::search::{SearchHints, UserSearch};
use chatline_lib::session::{AuthMode, SessionGate};
use chatline_lib::store::SendPath;
use chatline_lib::sync::{ChatSync, SyncUpdate};
use chatline_lib::{logging, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info};
use url::Url;

type Input = Lines<BufReader<Stdin>>;

const HELP: &str = "\
/chats                     refresh the chat list
/open <n>                  open chat number n
/close                     close the open chat
/start <username>          start a direct chat
/group <name> <a,b,...>    start a group chat
/search <query>            look up users
/profile <nick>|<status>[|<avatar path>]
/logout, /quit
anything else is sent to the open chat";

enum Flow {
    Continue,
    Logout,
    Quit,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // Keep the guard alive so buffered log lines are flushed on exit
    let _guard = match logging::init(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    info!(api = %config.api_base, ws = %config.ws_base, "Using backend endpoints");

    if let Err(e) = run(config).await {
        error!(error = %e, "Client stopped");
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: ClientConfig) -> Result<()> {
    let api = Arc::new(ApiClient::new(config.clone())?);
    let backend: Arc<dyn ChatBackend> = api.clone();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut gate = SessionGate::new(backend.clone());

    loop {
        let identity = match gate.bootstrap().await {
            Some(identity) => identity,
            None => match sign_in(&mut gate, &mut input).await {
                Some(identity) => identity,
                None => return Ok(()),
            },
        };
        println!("Signed in as {}. Type /help for commands.", identity.username);

        let cookies = api.clone();
        let (channel, mut events) = ChannelManager::new(config.clone());
        let channel = channel.with_cookies(Arc::new(move |url: &Url| cookies.cookie_header(url)));
        let mut sync = ChatSync::new(backend.clone(), channel, identity);
        let (mut search, mut hints) = UserSearch::new(backend.clone(), config.search_debounce);

        match sync.refresh_chats().await {
            Ok(()) => print_chats(&sync),
            Err(e) => println!("{e}"),
        }

        let flow = loop {
            tokio::select! {
                line = input.next_line() => {
                    let Ok(Some(line)) = line else {
                        break Flow::Quit;
                    };
                    match handle_line(&mut sync, &mut gate, &mut search, line.trim()).await {
                        Flow::Continue => {}
                        other => break other,
                    }
                }
                Some(event) = events.recv() => {
                    match sync.handle_event(event).await {
                        Ok(update) => render_update(&sync, update),
                        Err(e) => println!("{e}"),
                    }
                }
                Some(found) = hints.recv() => print_hints(&found),
            }
        };

        search.cancel();
        sync.shutdown().await;
        match flow {
            Flow::Logout => {
                gate.logout().await;
                println!("Signed out.");
            }
            _ => return Ok(()),
        }
    }
}

async fn sign_in(gate: &mut SessionGate, input: &mut Input) -> Option<Identity> {
    println!("Sign in with /login <user> <password>, or create an account with /register <user> <password>.");
    loop {
        let line = input.next_line().await.ok()??;
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let username = parts.next().unwrap_or_default();
        let password = parts.next().unwrap_or_default();

        let result = match command {
            "/login" => gate.login(username, password).await,
            "/register" => {
                gate.set_mode(AuthMode::Register);
                gate.register(username, password).await
            }
            "/quit" => return None,
            _ => {
                println!("Use /login or /register.");
                continue;
            }
        };
        match result {
            Ok(identity) => return Some(identity),
            Err(e) => {
                println!("{e}");
                if gate.mode() == AuthMode::Login && command == "/register" {
                    println!("Switched to sign in.");
                }
            }
        }
    }
}

async fn handle_line(
    sync: &mut ChatSync,
    gate: &mut SessionGate,
    search: &mut UserSearch,
    line: &str,
) -> Flow {
    if line.is_empty() {
        return Flow::Continue;
    }
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    let result = match command {
        "/help" => {
            println!("{HELP}");
            Ok(())
        }
        "/quit" => return Flow::Quit,
        "/logout" => return Flow::Logout,
        "/chats" => sync.refresh_chats().await.map(|()| print_chats(sync)),
        "/open" => open_chat(sync, rest).await,
        "/close" => sync.select_chat(None).await.map(|_| ()),
        "/start" => sync.start_chat(rest).await.map(|chat| {
            println!("Chat ready with {}", chat_title(&chat, &sync.identity().username));
            print_feed(sync);
        }),
        "/group" => {
            let (name, members) = rest.rsplit_once(' ').unwrap_or((rest, ""));
            let members: Vec<&str> = members.split(',').collect();
            sync.start_group(name, &members).await.map(|chat| {
                println!("Group {} created", chat_title(&chat, &sync.identity().username));
                print_feed(sync);
            })
        }
        "/search" => {
            search.input(rest);
            Ok(())
        }
        "/profile" => update_profile(gate, rest).await,
        _ if command.starts_with('/') => {
            println!("Unknown command {command}. Type /help.");
            Ok(())
        }
        _ => sync.send_text(line).await.map(|path| {
            if path == SendPath::Durable {
                print_feed(sync);
            }
        }),
    };

    if let Err(e) = result {
        println!("{e}");
    }
    Flow::Continue
}

async fn open_chat(sync: &mut ChatSync, arg: &str) -> Result<()> {
    let position: usize = arg
        .parse()
        .map_err(|_| ValidationError::Field(format!("Not a chat number: {arg}")))?;
    let chat = position
        .checked_sub(1)
        .and_then(|index| sync.chats().snapshot().into_iter().nth(index))
        .ok_or_else(|| ValidationError::Field(format!("No chat number {position}. Try /chats.")))?;

    sync.select_chat(Some(chat.id)).await?;
    println!("== {} ==", chat_title(&chat, &sync.identity().username));
    print_feed(sync);
    Ok(())
}

async fn update_profile(gate: &mut SessionGate, arg: &str) -> Result<()> {
    let mut fields = arg.split('|').map(str::trim);
    let nickname = fields.next().unwrap_or_default();
    let status = fields.next().unwrap_or_default();
    let avatar = match fields.next().filter(|path| !path.is_empty()) {
        Some(path) => Some(
            AvatarUpload::from_path(path)
                .await
                .map_err(|e| ValidationError::Field(format!("Cannot read avatar {path}: {e}")))?,
        ),
        None => None,
    };

    let update = ProfileUpdate::new(nickname, status, avatar)?;
    let identity = gate.update_profile(&update).await?;
    info!(username = %identity.username, "Profile saved");
    println!("Profile saved.");
    Ok(())
}

fn render_update(sync: &ChatSync, update: SyncUpdate) {
    match update {
        SyncUpdate::Connection(state) => println!("[{state}]"),
        SyncUpdate::MessageAppended(message) => print_message(sync, &message),
        SyncUpdate::Reconciled(_) => {
            println!("[reconnected]");
            print_feed(sync);
        }
        SyncUpdate::Ignored => {}
    }
}

fn print_chats(sync: &ChatSync) {
    let chats = sync.chats().snapshot();
    if chats.is_empty() {
        println!("No chats yet. Start one with /start <username>.");
        return;
    }
    let me = &sync.identity().username;
    for (index, chat) in chats.iter().enumerate() {
        println!("{:>3}. {}  {}", index + 1, chat_title(chat, me), preview_line(chat));
    }
}

fn print_feed(sync: &ChatSync) {
    for message in sync.feed().snapshot() {
        print_message(sync, &message);
    }
}

fn print_message(sync: &ChatSync, message: &Message) {
    let sender = match sync.selected_chat() {
        Some(chat) => sender_label(&chat, &message.sender),
        None => message.sender.clone(),
    };
    println!("{} {}: {}", format_time(message.timestamp), sender, message.text);
}

fn print_hints(hints: &SearchHints) {
    if hints.query.is_empty() {
        return;
    }
    if hints.users.is_empty() {
        println!("No users match \"{}\"", hints.query);
        return;
    }
    let names: Vec<String> = hints
        .users
        .iter()
        .map(|user| format!("{} ({})", user.label(), user.username))
        .collect();
    println!("Users: {}", names.join(", "));
}
