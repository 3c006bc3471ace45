use crate::error::StoryResult;
use crate::prompts::{PromptParameters, Template};
use crate::story::models::{ImageStyle, StoryGenre};

pub const STORY_TEMPLATE: Template = Template::new(
    "story",
    r#"Write a bedtime story in which a child is the main character.
The child is ${sex} and in the ${age_range} years age range.
The topic of the story is: ${topic}. The genre of the story is ${story_genre}.
If it fits naturally, weave in the child's favorite animals (${fav_animals}), favorite activities (${fav_activities}) and favorite shows (${fav_shows}); none of them is mandatory.
The story should be about 1000 words long and clearly divided into 5 chapters.
Start with the title on its own line, formatted exactly like this: Title of the story: <title>
Announce every chapter title on its own line, formatted exactly like this: Chapter <number> title: <chapter title>
Announce every chapter text on its own line, formatted exactly like this: Chapter <number> description: <chapter text>
Do not add a summary paragraph. Finish the story with a final line that says "The end."
Never include personal data. Be original and imaginative so the story is fun to read for children aged ${age_range}."#,
);

pub const CHAPTER_IMAGE_TEMPLATE: Template = Template::new(
    "chapter_image",
    r#"Illustrate chapter ${chapter_number} of a children's story in this style: ${image_style}.
The main character is a child with these traits:
1. Age range: ${age_range}
2. Gender: ${sex}
3. Eye color: ${eye_color}
4. Hair type: ${hair_type}
5. Hair color: ${hair_color}
6. Ethnicity: ${ethnicity}

Show a single scene from the chapter.
The picture must not contain any text or lettering.
Produce exactly one image.

Chapter text:
${chapter_content}"#,
);

pub const PROFILE_IMAGE_TEMPLATE: Template = Template::new(
    "profile_image",
    r#"Draw a portrait of a child with these traits:
- Age range: ${age_range}
- Gender: ${sex}
- Eye color: ${eye_color}
- Hair type: ${hair_type}
- Hair color: ${hair_color}
- Ethnicity: ${ethnicity}

Frame the child from the shoulders up, smiling, in front of a plain neutral background.
Use a soft style between realistic and cartoon.
The picture must not contain any text or lettering.
Produce exactly one image."#,
);

pub fn story_prompt(
    profile: &PromptParameters,
    topic: &str,
    genre: StoryGenre,
) -> StoryResult<String> {
    let mut parameters = profile.clone();
    parameters.insert("topic".to_string(), topic.to_string());
    parameters.insert("story_genre".to_string(), genre.as_str().to_string());
    STORY_TEMPLATE.render(&parameters)
}

pub fn chapter_image_prompt(
    profile: &PromptParameters,
    style: ImageStyle,
    chapter_content: &str,
    chapter_number: usize,
) -> StoryResult<String> {
    let mut parameters = profile.clone();
    parameters.insert("image_style".to_string(), style.as_str().to_string());
    parameters.insert("chapter_content".to_string(), chapter_content.to_string());
    parameters.insert("chapter_number".to_string(), chapter_number.to_string());
    CHAPTER_IMAGE_TEMPLATE.render(&parameters)
}

pub fn profile_image_prompt(profile: &PromptParameters) -> StoryResult<String> {
    PROFILE_IMAGE_TEMPLATE.render(profile)
}
