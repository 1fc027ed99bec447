/*!
 * Prompt templates for chunked document translation.
 *
 * The system prompt is the configured template with the language names
 * filled in, followed by the glossary block, the glossary rules and the
 * marker rules when several units share one request.
 */

/// Rules appended after the glossary block
pub const GLOSSARY_RULES: &str = "Translation rules (mandatory):
1. When a term from the glossary appears in the text, use the glossary translation.
2. Keep the translation of proper nouns consistent.";

/// Instruction asking the model to report new proper nouns
pub const NEW_TERMS_INSTRUCTION: &str = "3. When the text contains a new person or place name that is not in the glossary, add one final line on its own:
   NEW_TERMS: {\"Original Name\": \"Translated Name\"}
   The NEW_TERMS line must be valid JSON and must be the last line of the output. It is part of the required output format, not a note.";

/// Instruction for requests carrying several marked units
pub const UNIT_MARKER_INSTRUCTION: &str = "The text is split into sections, each starting with a marker line such as <<UNIT_1>> and the whole text ends with <<END>>. Translate every section, copy every marker line unchanged and in the same order, and keep <<END>> as the last marker.";

/// A text template with `{placeholder}` variables
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Fill the system prompt placeholders
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        self.template
            .replace("{source_language}", source_language)
            .replace("{target_language}", target_language)
    }

    /// Fill the user prompt placeholders; the text is appended when the template has no `{text}`
    pub fn render_user(&self, text: &str, language: &str) -> String {
        let rendered = self.template.replace("{language}", language);
        if rendered.contains("{text}") {
            rendered.replace("{text}", text)
        } else if rendered.trim().is_empty() {
            text.to_string()
        } else {
            format!("{}\n{}", rendered, text)
        }
    }
}

/// System and user prompt for one provider request
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationPrompt {
    pub system: String,
    pub user: String,
}

/// Builder for the prompts of one chunk
#[derive(Debug, Clone)]
pub struct TranslationPromptBuilder {
    system_template: PromptTemplate,
    user_template: PromptTemplate,
    source_language: String,
    target_language: String,
    glossary_text: String,
    glossary_enabled: bool,
    learn_terms: bool,
    multi_unit: bool,
}

impl TranslationPromptBuilder {
    pub fn new(system_template: &str, user_template: &str, source_language: &str, target_language: &str) -> Self {
        Self {
            system_template: PromptTemplate::new(system_template),
            user_template: PromptTemplate::new(user_template),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            glossary_text: String::new(),
            glossary_enabled: false,
            learn_terms: false,
            multi_unit: false,
        }
    }

    /// Enable the glossary block with the entries filtered for this chunk
    ///
    /// `learn_terms` adds the `NEW_TERMS` instruction; it is off once the
    /// glossary reached its size cap.
    pub fn with_glossary(mut self, glossary_text: &str, learn_terms: bool) -> Self {
        self.glossary_enabled = true;
        self.glossary_text = glossary_text.to_string();
        self.learn_terms = learn_terms;
        self
    }

    pub fn with_unit_markers(mut self, multi_unit: bool) -> Self {
        self.multi_unit = multi_unit;
        self
    }

    pub fn build_system(&self) -> String {
        let mut system = self
            .system_template
            .render(&self.source_language, &self.target_language);

        if self.glossary_enabled {
            system.push_str("\n\n");
            if !self.glossary_text.is_empty() {
                system.push_str(&self.glossary_text);
                system.push_str("\n\n");
            }
            system.push_str(GLOSSARY_RULES);
            if self.learn_terms {
                system.push('\n');
                system.push_str(NEW_TERMS_INSTRUCTION);
            }
        }

        if self.multi_unit {
            system.push_str("\n\n");
            system.push_str(UNIT_MARKER_INSTRUCTION);
        }

        system
    }

    pub fn build(&self, payload: &str) -> TranslationPrompt {
        TranslationPrompt {
            system: self.build_system(),
            user: self.user_template.render_user(payload, &self.target_language),
        }
    }
}
