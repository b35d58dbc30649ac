//! Example rows shown under the upload form.

use serde::Serialize;

use crate::engine::Language;

/// Prompt pre-filled in the text box.
pub const DEFAULT_PROMPT: &str = "It took me quite a long time to develop a voice, and now that I have it I'm not going to be silent.";

/// Speaker clip selected on the upload tab before anything is uploaded.
pub const DEFAULT_SPEAKER: &str = "female.wav";

/// One clickable example.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Example {
    pub prompt: &'static str,
    pub language: Language,
    /// File name of a bundled clip in the assets directory.
    pub speaker: &'static str,
    pub agree: bool,
}

/// The example table.
pub fn examples() -> Vec<Example> {
    vec![
        Example {
            prompt: "Once when I was six years old I saw a magnificent picture",
            language: Language::English,
            speaker: "female.wav",
            agree: true,
        },
        Example {
            prompt: "Lorsque j'avais six ans j'ai vu, une fois, une magnifique image",
            language: Language::French,
            speaker: "male.wav",
            agree: true,
        },
        Example {
            prompt: "Un tempo lontano, quando avevo sei anni, vidi un magnifico disegno",
            language: Language::Italian,
            speaker: "female.wav",
            agree: true,
        },
        Example {
            prompt: "Bir zamanlar, altı yaşındayken, muhteşem bir resim gördüm",
            language: Language::Turkish,
            speaker: "female.wav",
            agree: true,
        },
    ]
}
