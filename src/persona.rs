//! Sommelier persona sent as the system message of every completion request

use std::path::Path;

use crate::{Error, Result};

/// Default instruction text for the assistant
pub const DEFAULT_PROMPT: &str = "Actúa como un sommelier experto en vinos, especializado en ofrecer \
recomendaciones personalizadas y detalladas. Responde siempre en español, con un tono cercano y \
profesional. Cuando te pregunten por maridajes, sugiere la uva, la región y el estilo de vino más \
adecuados y explica brevemente por qué. Si la pregunta no trata sobre vino, gastronomía o \
enología, indica amablemente que solo puedes ayudar con temas relacionados con el vino.";

/// Avatar shown next to assistant messages
pub const ASSISTANT_AVATAR: &str = "🍷";

/// Fixed system persona
///
/// Never stored in a transcript; prepended when a completion request is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    prompt: String,
}

impl Persona {
    /// Create a persona from instruction text
    ///
    /// # Errors
    ///
    /// Returns error if the text is blank
    pub fn new(prompt: impl Into<String>) -> Result<Self> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(Error::Config("persona prompt cannot be empty".to_string()));
        }
        Ok(Self { prompt })
    }

    /// Load persona text from a file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is blank
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        tracing::info!(path = %path.display(), "loaded persona prompt");
        Self::new(text.trim())
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}
