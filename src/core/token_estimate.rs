/*
 * Token estimates for an export, so the user can judge whether the archive
 * fits a language model's context window before copying it anywhere.
 */
use std::sync::OnceLock;
use tiktoken_rs::{CoreBPE, cl100k_base};

pub trait TokenEstimatorOperations: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/*
 * Counts tokens with the `cl100k_base` encoding. The encoding is loaded on
 * first use and kept for the life of the estimator; if it cannot be loaded the
 * estimator falls back to counting whitespace-separated words.
 */
pub struct Cl100kTokenEstimator {
    bpe: OnceLock<Option<CoreBPE>>,
}

impl Cl100kTokenEstimator {
    pub fn new() -> Self {
        Cl100kTokenEstimator {
            bpe: OnceLock::new(),
        }
    }

    fn bpe(&self) -> Option<&CoreBPE> {
        self.bpe
            .get_or_init(|| match cl100k_base() {
                Ok(bpe) => Some(bpe),
                Err(e) => {
                    log::error!(
                        "TokenEstimator: Failed to load cl100k_base ({e}); using word counts."
                    );
                    None
                }
            })
            .as_ref()
    }
}

impl Default for Cl100kTokenEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenEstimatorOperations for Cl100kTokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        match self.bpe() {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => WordCountEstimator.estimate(text),
        }
    }
}

/// Whitespace word count; a rough lower bound on the token count.
pub struct WordCountEstimator;

impl TokenEstimatorOperations for WordCountEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}
