use serde::{Deserialize, Serialize};

/// One resolved search hit as shown to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub owner: String,
    pub subject: String,
    pub chunk: String,
}

/// Fixed texts used to talk to the model and to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplates {
    /// Role the model is asked to play, e.g. "an expert on the solar system"
    pub persona: String,
    /// Returned as-is for a blank question
    pub empty_query: String,
    /// Returned when the model or the store fails
    pub apology: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            persona: "a knowledgeable assistant".to_string(),
            empty_query: "Your question is empty. Ask something about your documents.".to_string(),
            apology: "Sorry, I can't answer right now. Please try again in a moment.".to_string(),
        }
    }
}

impl PromptTemplates {
    /// Prompt without retrieved context
    pub fn general(&self, query: &str) -> String {
        format!(
            "As {persona}, answer the following question.\n\nQuestion: {query}\n\nAnswer:",
            persona = self.persona
        )
    }

    /// Prompt grounded in `entries`, numbered from 1 in ranking order
    pub fn grounded(&self, entries: &[ContextEntry], query: &str) -> String {
        let mut context = String::new();
        for (rank, entry) in entries.iter().enumerate() {
            context.push_str(&format!(
                "{}. owner: \"{}\" subject: \"{}\" content: \"{}\"\n",
                rank + 1,
                entry.owner,
                entry.subject,
                entry.chunk
            ));
        }

        format!(
            "You are {persona}. Answer the question accurately using the information provided.\n\
             \n\
             Rules:\n\
             1. Prefer the evidence in the context below.\n\
             2. When you use an entry from the context, cite its number.\n\
             3. If the context does not contain the answer, answer from general knowledge and say so.\n\
             \n\
             [Context]\n\
             {context}\n\
             [Question]\n\
             {query}\n\
             \n\
             [Answer]",
            persona = self.persona
        )
    }
}
