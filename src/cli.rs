//! Line-based chat window: the hosting UI for a [`RoomSession`].
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use crate::{
    config::ChatConfig,
    error::ChatResult,
    models::{ChatMessage, Identity},
    session::RoomSession,
    state::RoomView,
};

/// Platform-wide rooms that are always listed.
pub const PINNED_ROOMS: [(&str, &str); 3] = [
    ("announcement", "Announcements"),
    ("general",      "General"),
    ("leaderboard",  "Leaderboard"),
];

#[derive(Debug, Parser)]
#[command(name = "ride-chat", about = "Chat in a ride's room from the terminal")]
pub struct Args {
    /// Room to join (a ride id or one of the pinned rooms)
    #[arg(short, long, default_value = "general")]
    pub room: String,

    /// Display name
    #[arg(short, long)]
    pub name: String,

    /// Stable user id, used to tell your own messages apart
    #[arg(short = 'u', long)]
    pub user_id: Option<String>,

    /// Chat server base, overrides CHAT_API_URL
    #[arg(long)]
    pub api_url: Option<String>,

    /// Page origin, overrides CHAT_PAGE_ORIGIN
    #[arg(long)]
    pub page_origin: Option<String>,

    /// Bearer token, overrides CHAT_TOKEN
    #[arg(long)]
    pub token: Option<String>,
}

impl Args {
    /// Flags on top of the environment.
    pub fn config(&self, mut base: ChatConfig) -> ChatConfig {
        if let Some(api) = &self.api_url { base.api_url = Some(api.clone()); }
        if let Some(origin) = &self.page_origin { base.page_origin = origin.clone(); }
        if let Some(token) = &self.token { base.token = Some(token.clone()); }
        base
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.name.clone(), self.user_id.clone())
    }
}

/// What a typed line asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Say(&'a str),
    Join(&'a str),
    Rooms,
    Quit,
    /// blank or whitespace-only
    Nothing,
    Unknown(&'a str),
}

impl<'a> Input<'a> {
    pub fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Input::Nothing;
        }
        let Some(cmd) = trimmed.strip_prefix('/') else { return Input::Say(line.trim_end_matches(['\r', '\n'])) };
        let mut parts = cmd.splitn(2, char::is_whitespace);
        match (parts.next().unwrap_or(""), parts.next().map(str::trim)) {
            ("join", Some(room)) if !room.is_empty() => Input::Join(room),
            ("rooms", _) => Input::Rooms,
            ("quit" | "exit", _) => Input::Quit,
            _ => Input::Unknown(trimmed),
        }
    }
}

/// Keeps track of what has been printed so each view change only prints
/// the tail, or everything again when the log was replaced.
#[derive(Debug, Default)]
pub struct Printer {
    room:      Option<String>,
    connected: bool,
    shown:     Vec<ChatMessage>,
}

impl Printer {
    pub fn lines(&mut self, view: &RoomView, me: &Identity) -> Vec<String> {
        let mut out = Vec::new();
        let rebound = view.room != self.room;
        if rebound || view.connected != self.connected {
            out.push(status_line(view));
        }
        let appended = !rebound
            && view.messages.len() >= self.shown.len()
            && view.messages[..self.shown.len()] == self.shown[..];
        let fresh = if appended { &view.messages[self.shown.len()..] } else { &view.messages[..] };
        out.extend(fresh.iter().map(|m| render(m, m.is_mine(me))));

        self.room = view.room.clone();
        self.connected = view.connected;
        self.shown = view.messages.clone();
        out
    }
}

pub fn status_line(view: &RoomView) -> String {
    let dot = if view.connected { '●' } else { '○' };
    match &view.room {
        Some(room) => format!("{dot} #{room}"),
        None => format!("{dot} (no room)"),
    }
}

/// Own messages are right-aligned without a name; others show the sender.
pub fn render(m: &ChatMessage, mine: bool) -> String {
    if mine {
        format!("{:>40} [{}]", m.content, m.timestamp)
    } else {
        format!("{}: {} [{}]", m.username, m.content, m.timestamp)
    }
}

/// Drive the window until `/quit` or end of input.
pub async fn run(args: Args) -> ChatResult<()> {
    let mut session = RoomSession::new(args.config(ChatConfig::from_env()), args.identity());
    let mut feed = session.subscribe();
    session.connect(&args.room)?;

    let mut printer = Printer::default();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let mut say = Vec::new();
        tokio::select! {
            changed = feed.changed() => {
                if changed.is_err() { break; }
                let view = feed.borrow_and_update().clone();
                say = printer.lines(&view, session.identity());
            }
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                match Input::parse(&line) {
                    Input::Say(text) if !session.is_connected() => {
                        say.push(format!("not connected, dropped: {text}"));
                    }
                    Input::Say(text) => { session.send(text); }
                    Input::Nothing => say.push("nothing to send".into()),
                    Input::Join(room) => {
                        info!(room, "switching room");
                        if let Err(e) = session.connect(room) { say.push(e.to_string()); }
                    }
                    Input::Rooms => {
                        say.extend(PINNED_ROOMS.iter().map(|(id, name)| format!("  {id:<14}{name}")));
                    }
                    Input::Quit => break,
                    Input::Unknown(cmd) => say.push(format!("unknown command {cmd}")),
                }
            }
        }
        for l in say {
            stdout.write_all(l.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        stdout.flush().await?;
    }
    session.shutdown().await;
    Ok(())
}
