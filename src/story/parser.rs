//! Recovers the title and the ordered chapters from generated story text.
//!
//! The text is first split into announcements (`Title of the story:`,
//! `Chapter <n> title:`, `Chapter <n> description:` and a closing `The end.`
//! line). A small state machine then walks the announcements and the text in
//! between them. Announcements only count at the start of a line, with light
//! tolerance for markdown emphasis and capitalisation.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{StoryError, StoryResult};
use crate::story::models::{ExtractedChapter, ExtractedStory};

static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t>#*_]*title of the story[ \t*_]*:[ \t*_]*")
        .expect("title pattern is valid")
});

static CHAPTER_TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t>#*_]*chapter[ \t]+(\d+)[ \t]+title[ \t*_]*:[ \t*_]*")
        .expect("chapter title pattern is valid")
});

static CHAPTER_BODY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t>#*_]*chapter[ \t]+(\d+)[ \t]+description[ \t*_]*:[ \t*_]*")
        .expect("chapter body pattern is valid")
});

static END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t*_]*the end[ \t]*[.!]*[ \t*_]*\r?$").expect("end pattern is valid")
});

const EMPHASIS: &[char] = &['*', '_', '#'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnnouncementKind {
    Title,
    ChapterTitle,
    ChapterBody,
    End,
}

#[derive(Debug, Clone, Copy)]
struct Announcement {
    kind: AnnouncementKind,
    number: Option<u32>,
    start: usize,
    end: usize,
}

fn collect(text: &str, re: &Regex, kind: AnnouncementKind, out: &mut Vec<Announcement>) {
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let number = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        out.push(Announcement {
            kind,
            number,
            start: whole.start(),
            end: whole.end(),
        });
    }
}

fn tokenize(text: &str) -> Vec<Announcement> {
    let mut found = Vec::new();
    collect(text, &TITLE_RE, AnnouncementKind::Title, &mut found);
    collect(text, &CHAPTER_TITLE_RE, AnnouncementKind::ChapterTitle, &mut found);
    collect(text, &CHAPTER_BODY_RE, AnnouncementKind::ChapterBody, &mut found);
    collect(text, &END_RE, AnnouncementKind::End, &mut found);
    found.sort_by_key(|announcement| announcement.start);

    let mut tokens: Vec<Announcement> = Vec::with_capacity(found.len());
    for announcement in found {
        if let Some(last) = tokens.last() {
            if announcement.start < last.end {
                continue;
            }
        }
        tokens.push(announcement);
    }
    tokens
}

fn clean(segment: &str) -> String {
    segment
        .trim()
        .trim_matches(EMPHASIS)
        .trim()
        .to_string()
}

fn label(number: Option<u32>) -> String {
    number
        .map(|number| number.to_string())
        .unwrap_or_else(|| "?".to_string())
}

enum State {
    AwaitingChapter,
    ChapterTitle { number: Option<u32>, start: usize },
    ChapterBody { number: Option<u32>, title: String, start: usize },
}

struct Extraction<'a> {
    text: &'a str,
    chapters: Vec<ExtractedChapter>,
}

impl<'a> Extraction<'a> {
    fn finish_chapter(
        &mut self,
        number: Option<u32>,
        title: String,
        body_start: usize,
        body_end: usize,
    ) -> StoryResult<()> {
        let content = clean(&self.text[body_start..body_end]);
        if title.is_empty() {
            return Err(StoryError::MalformedStory(format!(
                "chapter {} has an empty title",
                label(number)
            )));
        }
        if content.is_empty() {
            return Err(StoryError::MalformedStory(format!(
                "chapter {} has an empty description",
                label(number)
            )));
        }
        let position = self.chapters.len() as u32 + 1;
        if number.is_some_and(|number| number != position) {
            warn!(
                "Chapter announced as {} appears at position {}; keeping source order",
                label(number),
                position
            );
        }
        self.chapters.push(ExtractedChapter { title, content });
        Ok(())
    }
}

pub fn extract(raw: &str) -> StoryResult<ExtractedStory> {
    if raw.trim().is_empty() {
        return Err(StoryError::MalformedStory("story text is empty".to_string()));
    }

    let tokens = tokenize(raw);
    let Some(title_index) = tokens
        .iter()
        .position(|token| token.kind == AnnouncementKind::Title)
    else {
        return Err(StoryError::MalformedStory(
            "missing 'Title of the story:' announcement".to_string(),
        ));
    };

    let rest = &tokens[title_index + 1..];
    let title_end = rest
        .iter()
        .find(|token| {
            matches!(
                token.kind,
                AnnouncementKind::ChapterTitle | AnnouncementKind::End
            )
        })
        .map(|token| token.start)
        .unwrap_or(raw.len());
    let title = clean(&raw[tokens[title_index].end..title_end]);
    if title.is_empty() {
        return Err(StoryError::MalformedStory("story title is empty".to_string()));
    }

    let mut extraction = Extraction {
        text: raw,
        chapters: Vec::new(),
    };
    let mut state = State::AwaitingChapter;
    let mut body_end = raw.len();

    for token in rest.iter().filter(|token| token.start >= title_end) {
        let mut reached_end = false;
        state = match (state, token.kind) {
            (current, AnnouncementKind::End) => {
                body_end = token.start;
                reached_end = true;
                current
            }
            (State::AwaitingChapter, AnnouncementKind::ChapterTitle) => State::ChapterTitle {
                number: token.number,
                start: token.end,
            },
            (State::ChapterTitle { number, start }, AnnouncementKind::ChapterBody) => {
                if token.number != number {
                    warn!(
                        "Chapter {} title is followed by chapter {} description",
                        label(number),
                        label(token.number)
                    );
                }
                State::ChapterBody {
                    number,
                    title: clean(&raw[start..token.start]),
                    start: token.end,
                }
            }
            (State::ChapterBody { number, title, start }, AnnouncementKind::ChapterTitle) => {
                extraction.finish_chapter(number, title, start, token.start)?;
                State::ChapterTitle {
                    number: token.number,
                    start: token.end,
                }
            }
            (State::ChapterTitle { number, .. }, _) => {
                return Err(StoryError::MalformedStory(format!(
                    "chapter {} has a title but no description",
                    label(number)
                )));
            }
            (_, AnnouncementKind::ChapterBody) => {
                return Err(StoryError::MalformedStory(format!(
                    "chapter {} description appears without a chapter title",
                    label(token.number)
                )));
            }
            (_, AnnouncementKind::Title) => {
                return Err(StoryError::MalformedStory(
                    "story contains more than one title announcement".to_string(),
                ));
            }
        };
        if reached_end {
            break;
        }
    }

    match state {
        State::ChapterBody {
            number,
            title,
            start,
        } => extraction.finish_chapter(number, title, start, body_end)?,
        State::ChapterTitle { number, .. } => {
            return Err(StoryError::MalformedStory(format!(
                "chapter {} has a title but no description",
                label(number)
            )));
        }
        State::AwaitingChapter => {}
    }

    if extraction.chapters.is_empty() {
        return Err(StoryError::MalformedStory(
            "no chapter announcements found".to_string(),
        ));
    }

    debug!(
        title = %title,
        chapters = extraction.chapters.len(),
        "Extracted story structure"
    );

    Ok(ExtractedStory {
        title,
        chapters: extraction.chapters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::fixture::FIXTURE_STORY;

    fn compose(title: &str, chapters: &[(&str, &str)]) -> String {
        let mut text = format!("Title of the story: {title}\n\n");
        for (index, (chapter_title, content)) in chapters.iter().enumerate() {
            let number = index + 1;
            text.push_str(&format!(
                "Chapter {number} title: {chapter_title}\n\nChapter {number} description:\n{content}\n\n"
            ));
        }
        text.push_str("The end.");
        text
    }

    fn malformed(raw: &str) -> String {
        match extract(raw) {
            Err(StoryError::MalformedStory(reason)) => reason,
            other => panic!("expected a malformed story, got {other:?}"),
        }
    }

    #[test]
    fn recovers_the_composed_structure() {
        let chapters = [
            ("The Map", "Sam found a map under the bed."),
            ("The River", "The river sang all the way to the sea."),
            ("Home", "Everyone was back in time for supper."),
        ];
        let story = extract(&compose("Sam and the Map", &chapters)).unwrap();

        assert_eq!(story.title, "Sam and the Map");
        let recovered: Vec<(&str, &str)> = story
            .chapters
            .iter()
            .map(|chapter| (chapter.title.as_str(), chapter.content.as_str()))
            .collect();
        assert_eq!(recovered, chapters.to_vec());
    }

    #[test]
    fn fixture_story_has_five_chapters() {
        let story = extract(FIXTURE_STORY.trim()).unwrap();
        assert_eq!(story.title, "The Night the Moon Sent an Invitation");
        assert_eq!(story.chapters.len(), 5);
        assert_eq!(story.chapters[0].title, "A Silver Letter");
        assert_eq!(story.chapters[4].title, "Home Before Sunrise");
        assert!(story.chapters[4].content.ends_with("the next invitation."));
        assert!(story
            .chapters
            .iter()
            .all(|chapter| !chapter.title.is_empty() && !chapter.content.is_empty()));
    }

    #[test]
    fn empty_text_is_rejected() {
        malformed("");
        malformed("   \n\t ");
    }

    #[test]
    fn text_without_title_is_rejected() {
        let reason = malformed("Chapter 1 title: Start\nChapter 1 description:\nOnce upon a time.");
        assert!(reason.contains("Title of the story"));
    }

    #[test]
    fn title_without_chapters_is_rejected() {
        let reason = malformed("Title of the story: Lonely Title\n\nSome prose but no chapters.\n");
        assert!(reason.contains("no chapter"));
    }

    #[test]
    fn announcement_free_blob_is_not_a_chapter() {
        malformed("Once upon a time there was a fox. Chapter after chapter it ran. The end.");
    }

    #[test]
    fn tolerates_emphasis_and_capitalisation() {
        let raw = "**Title of the story:** *The Brave Kite*\n\n\
                   **CHAPTER 1 TITLE:** Up We Go\n\
                   **chapter 1 Description:** The kite rose above the trees.\n\n\
                   ## Chapter 2 title: Windy Hill\n\
                   __Chapter 2 description:__\nIt danced over the hill.\n\n\
                   **The End.**\n";
        let story = extract(raw).unwrap();
        assert_eq!(story.title, "The Brave Kite");
        assert_eq!(story.chapters.len(), 2);
        assert_eq!(story.chapters[0].title, "Up We Go");
        assert_eq!(story.chapters[0].content, "The kite rose above the trees.");
        assert_eq!(story.chapters[1].title, "Windy Hill");
        assert_eq!(story.chapters[1].content, "It danced over the hill.");
    }

    #[test]
    fn prose_mentioning_chapters_stays_in_the_body() {
        let body = "She opened the book. Chapter 2 title: was written in gold.\nChapter after chapter, the tale went on.";
        let raw = compose("Books", &[("Reading", body), ("Sleeping", "Then she slept.")]);
        let story = extract(&raw).unwrap();
        assert_eq!(story.chapters.len(), 2);
        assert_eq!(story.chapters[0].content, body);
    }

    #[test]
    fn end_marker_closes_the_story() {
        let raw = "Title of the story: Short\nChapter 1 title: Only\nChapter 1 description:\nA tiny tale.\nThe end.\nI hope you enjoyed this story!";
        let story = extract(raw).unwrap();
        assert_eq!(story.chapters.len(), 1);
        assert_eq!(story.chapters[0].content, "A tiny tale.");
    }

    #[test]
    fn missing_end_marker_and_final_newline_are_fine() {
        let raw = "Title of the story: Short\nChapter 1 title: Only\nChapter 1 description: A tiny tale";
        let story = extract(raw).unwrap();
        assert_eq!(story.chapters[0].content, "A tiny tale");
    }

    #[test]
    fn windows_line_endings_are_accepted() {
        let raw = "Title of the story: Crlf\r\n\r\nChapter 1 title: One\r\nChapter 1 description:\r\nFirst.\r\n\r\nThe end.\r\n";
        let story = extract(raw).unwrap();
        assert_eq!(story.title, "Crlf");
        assert_eq!(story.chapters[0].title, "One");
        assert_eq!(story.chapters[0].content, "First.");
    }

    #[test]
    fn chapter_title_without_description_is_rejected() {
        let raw = "Title of the story: Gap\nChapter 1 title: One\nChapter 1 description: First.\nChapter 2 title: Two\nChapter 3 title: Three\nChapter 3 description: Third.";
        let reason = malformed(raw);
        assert!(reason.contains("chapter 2"));
    }

    #[test]
    fn empty_chapter_body_is_rejected() {
        let raw = "Title of the story: Hollow\nChapter 1 title: One\nChapter 1 description:\n\nThe end.";
        let reason = malformed(raw);
        assert!(reason.contains("empty description"));
    }
}
