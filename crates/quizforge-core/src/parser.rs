//! TOML question bank parser.
//!
//! Loads question banks from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Question, QuestionId, QuestionType};

/// A named collection of questions loaded from one file.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionBank {
    pub id: String,
    pub name: String,
    pub description: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    /// Category for questions that do not name their own.
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: QuestionId,
    text: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    answer: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    category: Option<String>,
}

/// Parse a single TOML file into a `QuestionBank`.
pub fn parse_bank(path: &Path) -> Result<QuestionBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question bank: {}", path.display()))?;

    parse_bank_str(&content, path)
}

/// Parse a TOML string into a `QuestionBank`.
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<QuestionBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let default_category = parsed.bank.category;

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| {
            // Without an explicit type, options imply multiple choice.
            let kind = match q.kind {
                Some(k) => k.parse().map_err(|e: String| {
                    anyhow::anyhow!("question {} in {}: {e}", q.id, source_path.display())
                })?,
                None if q.options.is_empty() => QuestionType::ShortAnswer,
                None => QuestionType::MultipleChoice,
            };
            let category = q
                .category
                .or_else(|| default_category.clone())
                .with_context(|| {
                    format!(
                        "question {} in {} has no category and the bank sets none",
                        q.id,
                        source_path.display()
                    )
                })?;

            Ok(Question {
                id: q.id,
                text: q.text,
                kind,
                options: q.options,
                correct_answer: q.answer,
                explanation: q.explanation,
                category,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuestionBank {
        id: parsed.bank.id,
        name: parsed.bank.name,
        description: parsed.bank.description,
        questions,
    })
}

/// Recursively load all `.toml` question banks from a directory.
///
/// Files that fail to parse are skipped with a warning.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<QuestionBank>> {
    let mut banks = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            banks.extend(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(banks)
}

/// A warning from question bank validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    pub question_id: Option<QuestionId>,
    pub message: String,
}

/// Check a bank for duplicate ids and malformed questions.
pub fn validate_bank(bank: &QuestionBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_ids = HashSet::new();
    for question in &bank.questions {
        if !seen_ids.insert(question.id) {
            warnings.push(ValidationWarning {
                question_id: Some(question.id),
                message: format!("duplicate question ID: {}", question.id),
            });
        }
        if let Err(violation) = question.validate() {
            warnings.push(ValidationWarning {
                question_id: Some(question.id),
                message: violation.to_string(),
            });
        }
        if question.text.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(question.id),
                message: "question text is empty".into(),
            });
        }
        if !question.is_multiple_choice() && !question.options.is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(question.id),
                message: "short answer question lists options, they will be ignored".into(),
            });
        }
    }

    if bank.questions.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: format!("bank {} has no questions", bank.id),
        });
    }

    warnings
}
