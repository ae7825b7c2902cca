mod config;

use std::{io, io::BufRead, thread};

use crossbeam_channel::{select, unbounded, Sender};
use env_logger::{Builder, Env};
use startlinker_core::{
    avatar::{avatar_url, display_name, media_url},
    error::Error,
    follow::{FollowBus, FollowStateChanged},
    model::{NewStory, Story, UserId},
    recent::RecentSearches,
    viewer::{
        input::{InputEvent, Key},
        Ring, StoryViewer, ViewerCommand, ViewerConfig, ViewerEvent,
    },
    webapi::WebApi,
};

use crate::config::Config;

const ENV_LOG: &str = "STARTLINKER_LOG";
const ENV_LOG_STYLE: &str = "STARTLINKER_LOG_STYLE";

const AVATAR_SIZE: u32 = 64;

fn main() {
    // Setup logging from the env variables, with defaults.
    Builder::from_env(
        Env::new()
            .filter_or(ENV_LOG, "info")
            .write_style(ENV_LOG_STYLE),
    )
    .init();

    let config = match Config::load() {
        Ok(Some(config)) => config,
        Ok(None) => {
            // First run, leave a file for the user to fill in.
            let config = Config::default();
            if let Err(err) = config.save() {
                log::warn!("failed to write default config: {}", err);
            }
            config
        }
        Err(err) => {
            log::error!("failed to load config, using defaults: {}", err);
            Config::default()
        }
    };

    if let Err(err) = start(config) {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

fn start(config: Config) -> Result<(), Error> {
    let backend = WebApi::new(config.web_api())?.into_handle();
    let bus = FollowBus::new();
    let mut recent = match Config::recent_searches_path() {
        Some(path) => RecentSearches::load(path),
        None => {
            log::warn!("no config dir, recent searches are not kept");
            RecentSearches::load(std::env::temp_dir().join("startlinker_recent_searches.json"))
        }
    };

    let mut viewer = StoryViewer::new(config.current_user(), backend, ViewerConfig::default());
    viewer.subscribe_follows(&bus);
    viewer.start();

    let (command_sender, commands) = unbounded();
    let _ui_thread = thread::spawn(move || read_commands(command_sender));

    let events = viewer.receiver();
    loop {
        select! {
            recv(events) -> event => {
                let Ok(event) = event else { break };
                render(&event);
                viewer.handle(event);
            }
            recv(commands) -> command => match command {
                Ok(CliCommand::Quit) | Err(_) => break,
                Ok(command) => run(command, &mut viewer, &bus, &mut recent),
            }
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq)]
enum CliCommand {
    Viewer(ViewerCommand),
    Follow(UserId),
    Unfollow(UserId),
    Search(String),
    Recent,
    ClearRecent,
    Quit,
}

fn read_commands(sender: Sender<CliCommand>) {
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log::error!("failed to read stdin: {}", err);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(command) => {
                let quit = command == CliCommand::Quit;
                if sender.send(command).is_err() || quit {
                    break;
                }
            }
            Err(err) => log::warn!("{}", err),
        }
    }
}

fn parse_command(line: &str) -> Result<CliCommand, String> {
    let line = line.trim();
    let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let viewer = |cmd| -> Result<CliCommand, String> { Ok(CliCommand::Viewer(cmd)) };
    match name {
        "rings" => viewer(ViewerCommand::ListRings),
        "mine" => viewer(ViewerCommand::OpenMine { index: 0 }),
        "open" => viewer(ViewerCommand::OpenRing {
            position: parse_arg(rest, "open <n>")?,
        }),
        "<" | "prev" => viewer(ViewerCommand::Input(InputEvent::Key(Key::ArrowLeft))),
        ">" | "next" => viewer(ViewerCommand::Input(InputEvent::Key(Key::ArrowRight))),
        "esc" => viewer(ViewerCommand::Input(InputEvent::Key(Key::Escape))),
        "click" => {
            let (x, width) = rest.split_once(' ').unwrap_or((rest, ""));
            viewer(ViewerCommand::Input(InputEvent::Press {
                x: parse_arg(x, "click <x> <width>")?,
                width: parse_arg(width, "click <x> <width>")?,
            }))
        }
        "more" => viewer(ViewerCommand::LoadMore),
        "refresh" => viewer(ViewerCommand::Refresh),
        "post" if !rest.is_empty() => viewer(ViewerCommand::CreateStory {
            story: NewStory::text(rest),
        }),
        "post" => Err("usage: post <text>".into()),
        "follow" => Ok(CliCommand::Follow(UserId(parse_arg(rest, "follow <id>")?))),
        "unfollow" => Ok(CliCommand::Unfollow(UserId(parse_arg(
            rest,
            "unfollow <id>",
        )?))),
        "search" if !rest.is_empty() => Ok(CliCommand::Search(rest.to_owned())),
        "search" => Err("usage: search <term>".into()),
        "recent" => Ok(CliCommand::Recent),
        "clear-recent" => Ok(CliCommand::ClearRecent),
        "quit" | "q" => Ok(CliCommand::Quit),
        _ => Err(format!("unknown command: {}", name)),
    }
}

fn parse_arg<T: std::str::FromStr>(arg: &str, usage: &str) -> Result<T, String> {
    arg.trim().parse().map_err(|_| format!("usage: {}", usage))
}

fn run(command: CliCommand, viewer: &mut StoryViewer, bus: &FollowBus, recent: &mut RecentSearches) {
    match command {
        CliCommand::Viewer(cmd) => viewer.handle(ViewerEvent::Command(cmd)),
        CliCommand::Follow(user) => {
            bus.publish(FollowStateChanged::followed(user));
        }
        CliCommand::Unfollow(user) => {
            bus.publish(FollowStateChanged::unfollowed(user));
        }
        CliCommand::Search(term) => {
            if let Err(err) = recent.record(&term) {
                log::error!("failed to save recent searches: {}", err);
            }
            let rings = viewer.rings();
            let found: Vec<_> = rings
                .iter()
                .enumerate()
                .filter(|(_, ring)| matches_search(ring, &term))
                .collect();
            if found.is_empty() {
                println!("no stories match {:?}", term);
            }
            for (position, ring) in found {
                print_ring(position, ring);
            }
        }
        CliCommand::Recent => {
            for term in recent.items() {
                println!("  {}", term);
            }
        }
        CliCommand::ClearRecent => {
            if let Err(err) = recent.clear() {
                log::error!("failed to clear recent searches: {}", err);
            }
        }
        CliCommand::Quit => {}
    }
}

fn matches_search(ring: &Ring, term: &str) -> bool {
    let term = term.to_lowercase();
    ring.author.username.to_lowercase().contains(&term)
        || display_name(&ring.author).to_lowercase().contains(&term)
}

fn render(event: &ViewerEvent) {
    match event {
        ViewerEvent::FeedUpdated { rings, has_more } => {
            for (position, ring) in rings.iter().enumerate() {
                print_ring(position, ring);
            }
            if *has_more {
                println!("  ... more stories available");
            }
        }
        ViewerEvent::Opened { author, count, .. } => {
            println!("> {} ({} stories)", display_name(author), count);
        }
        ViewerEvent::Showing {
            story,
            index,
            count,
        } => {
            println!("  [{}/{}] {}", index + 1, count, describe(story));
        }
        ViewerEvent::Closed => {
            println!("< closed");
        }
        _ => {}
    }
}

fn print_ring(position: usize, ring: &Ring) {
    println!(
        "{:>3} {} {} ({}) {}",
        position,
        if ring.has_viewed { " " } else { "*" },
        display_name(&ring.author),
        ring.count,
        avatar_url(&ring.author, AVATAR_SIZE),
    );
}

fn describe(story: &Story) -> String {
    let body = story
        .text_content
        .as_deref()
        .or(story.link_title.as_deref())
        .or(story.link_url.as_deref())
        .or(media_url(story.image.as_deref()))
        .or(media_url(story.video.as_deref()))
        .unwrap_or("");
    format!(
        "{} {} on {}",
        story.story_type.as_str(),
        body,
        story.background_color()
    )
}
