/*!
 * Prompt construction for chunk translation.
 *
 * - System prompt template with language names
 * - Glossary block and rules, `NEW_TERMS` instruction while learning
 * - Unit marker rules for multi-unit requests
 */

pub mod templates;

pub use templates::{PromptTemplate, TranslationPrompt, TranslationPromptBuilder};
