use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::story::models::{ImageStyle, StoryGenre, StoryRequest};

pub fn usage() -> &'static str {
    "Usage: storybook <command> [options]

Commands:
  init-db                                   Create the database tables
  add-demo-child [--name <name>]            Insert a sample child profile
  generate --child <id> --topic <text> [--style <style>] [--genre <genre>]
  submit   --child <id> --topic <text> [--style <style>] [--genre <genre>]
  status --job <id>                         Show the outcome of a submitted job
  worker [--once]                           Run queued jobs until Ctrl-C
  show-story --story <id> [--export-dir <dir>]
  list-stories --child <id>
  profile-image --child <id> [--output <file>]

Styles: Cartoon, Realistic, Fantasy, Watercolor, Anime (default Cartoon)
Genres: Fantasy, Adventure, Educational (default Fantasy)"
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    InitDb,
    AddDemoChild { name: String },
    Generate(StoryRequest),
    Submit(StoryRequest),
    Status { job_id: String },
    Worker { once: bool },
    ShowStory { story_id: String, export_dir: Option<PathBuf> },
    ListStories { child_id: String },
    ProfileImage { child_id: String, output: Option<PathBuf> },
    Help,
}

fn take_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> Result<&'a str> {
    *index += 1;
    args.get(*index)
        .map(|value| value.as_str())
        .ok_or_else(|| anyhow!("Missing value for {flag}"))
}

fn unknown(command: &str, other: &str) -> anyhow::Error {
    anyhow!("Unknown {command} argument: {other}\n{}", usage())
}

fn parse_story_request(command: &str, args: &[String]) -> Result<StoryRequest> {
    let mut child_id = None;
    let mut topic = None;
    let mut image_style = ImageStyle::Cartoon;
    let mut story_genre = StoryGenre::Fantasy;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--child" => child_id = Some(take_value(args, &mut index, "--child")?.to_string()),
            "--topic" => topic = Some(take_value(args, &mut index, "--topic")?.to_string()),
            "--style" => {
                image_style = take_value(args, &mut index, "--style")?
                    .parse::<ImageStyle>()
                    .map_err(|err| anyhow!(err))?;
            }
            "--genre" => {
                story_genre = take_value(args, &mut index, "--genre")?
                    .parse::<StoryGenre>()
                    .map_err(|err| anyhow!(err))?;
            }
            other => return Err(unknown(command, other)),
        }
        index += 1;
    }

    let child_id = child_id.ok_or_else(|| anyhow!("--child is required"))?;
    let topic = topic
        .filter(|topic| !topic.trim().is_empty())
        .ok_or_else(|| anyhow!("--topic is required"))?;

    Ok(StoryRequest {
        child_id,
        topic,
        image_style,
        story_genre,
    })
}

fn parse_single_flag(command: &str, args: &[String], flag: &str) -> Result<String> {
    let mut value = None;
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            current if current == flag => {
                value = Some(take_value(args, &mut index, flag)?.to_string());
            }
            other => return Err(unknown(command, other)),
        }
        index += 1;
    }
    value.ok_or_else(|| anyhow!("{flag} is required"))
}

/// Parses `argv` including the program name.
pub fn parse_args(args: &[String]) -> Result<CliCommand> {
    let Some(command) = args.get(1).map(|value| value.as_str()) else {
        return Ok(CliCommand::Help);
    };
    let rest = &args[2..];
    if rest.iter().any(|arg| arg == "--help" || arg == "-h") {
        return Ok(CliCommand::Help);
    }

    match command {
        "init-db" => {
            if let Some(other) = rest.first() {
                return Err(unknown(command, other));
            }
            Ok(CliCommand::InitDb)
        }
        "add-demo-child" => {
            let mut name = "Robin".to_string();
            let mut index = 0;
            while index < rest.len() {
                match rest[index].as_str() {
                    "--name" => name = take_value(rest, &mut index, "--name")?.to_string(),
                    other => return Err(unknown(command, other)),
                }
                index += 1;
            }
            Ok(CliCommand::AddDemoChild { name })
        }
        "generate" => Ok(CliCommand::Generate(parse_story_request(command, rest)?)),
        "submit" => Ok(CliCommand::Submit(parse_story_request(command, rest)?)),
        "status" => Ok(CliCommand::Status {
            job_id: parse_single_flag(command, rest, "--job")?,
        }),
        "worker" => {
            let mut once = false;
            for arg in rest {
                match arg.as_str() {
                    "--once" => once = true,
                    other => return Err(unknown(command, other)),
                }
            }
            Ok(CliCommand::Worker { once })
        }
        "show-story" => {
            let mut story_id = None;
            let mut export_dir = None;
            let mut index = 0;
            while index < rest.len() {
                match rest[index].as_str() {
                    "--story" => story_id = Some(take_value(rest, &mut index, "--story")?.to_string()),
                    "--export-dir" => {
                        export_dir = Some(PathBuf::from(take_value(rest, &mut index, "--export-dir")?));
                    }
                    other => return Err(unknown(command, other)),
                }
                index += 1;
            }
            Ok(CliCommand::ShowStory {
                story_id: story_id.ok_or_else(|| anyhow!("--story is required"))?,
                export_dir,
            })
        }
        "list-stories" => Ok(CliCommand::ListStories {
            child_id: parse_single_flag(command, rest, "--child")?,
        }),
        "profile-image" => {
            let mut child_id = None;
            let mut output = None;
            let mut index = 0;
            while index < rest.len() {
                match rest[index].as_str() {
                    "--child" => child_id = Some(take_value(rest, &mut index, "--child")?.to_string()),
                    "--output" => output = Some(PathBuf::from(take_value(rest, &mut index, "--output")?)),
                    other => return Err(unknown(command, other)),
                }
                index += 1;
            }
            Ok(CliCommand::ProfileImage {
                child_id: child_id.ok_or_else(|| anyhow!("--child is required"))?,
                output,
            })
        }
        "help" | "--help" | "-h" => Ok(CliCommand::Help),
        other => Err(anyhow!("Unknown command: {other}\n{}", usage())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        std::iter::once("storybook")
            .chain(parts.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn generate_uses_defaults_for_style_and_genre() {
        let command = parse_args(&argv(&["generate", "--child", "abc", "--topic", "space bees"])).unwrap();
        assert_eq!(
            command,
            CliCommand::Generate(StoryRequest {
                child_id: "abc".into(),
                topic: "space bees".into(),
                image_style: ImageStyle::Cartoon,
                story_genre: StoryGenre::Fantasy,
            })
        );
    }

    #[test]
    fn submit_parses_style_and_genre_case_insensitively() {
        let command = parse_args(&argv(&[
            "submit", "--child", "abc", "--topic", "rivers", "--style", "anime", "--genre", "educational",
        ]))
        .unwrap();
        let CliCommand::Submit(request) = command else {
            panic!("expected submit");
        };
        assert_eq!(request.image_style, ImageStyle::Anime);
        assert_eq!(request.story_genre, StoryGenre::Educational);
    }

    #[test]
    fn missing_values_and_unknown_flags_are_errors() {
        assert!(parse_args(&argv(&["generate", "--child"])).is_err());
        assert!(parse_args(&argv(&["generate", "--child", "abc"])).is_err());
        assert!(parse_args(&argv(&["status", "--story", "x"])).is_err());
        assert!(parse_args(&argv(&["generate", "--child", "a", "--topic", "b", "--style", "Pixel"])).is_err());
        assert!(parse_args(&argv(&["dance"])).is_err());
    }

    #[test]
    fn no_command_and_help_flag_show_usage() {
        assert_eq!(parse_args(&argv(&[])).unwrap(), CliCommand::Help);
        assert_eq!(parse_args(&argv(&["worker", "--help"])).unwrap(), CliCommand::Help);
        assert_eq!(
            parse_args(&argv(&["worker", "--once"])).unwrap(),
            CliCommand::Worker { once: true }
        );
    }
}
