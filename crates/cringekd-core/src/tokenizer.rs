//! Thin wrapper around the Hugging Face `tokenizers` crate.
//!
//! The encoder's tokenizer is an external artifact (`tokenizer.json` next to
//! the model weights); this wrapper only adds the fixed-length shaping the
//! batch assembly needs: truncate to `max_length`, then right-pad with the
//! pad token so every sequence in a batch has the same width.

use std::path::Path;

use tokenizers::Tokenizer as HfTokenizer;

use crate::error::{CoreError, CoreResult};

/// One encoded text, truncated and padded to a fixed length.
#[derive(Debug, Clone)]
pub struct EncodedText {
    pub ids: Vec<u32>,
    pub type_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

pub struct Tokenizer {
    inner: HfTokenizer,
    pad_token_id: u32,
}

impl Tokenizer {
    /// Load a tokenizer from a `tokenizer.json` file.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let inner = HfTokenizer::from_file(path)
            .map_err(|e| CoreError::Tokenizer(e.to_string()))?;
        Ok(Self::new(inner))
    }

    /// Wrap an already-built tokenizer.
    pub fn new(inner: HfTokenizer) -> Self {
        let vocab = inner.get_vocab(true);
        let pad_token_id = ["[PAD]", "<pad>", "<|endoftext|>"]
            .iter()
            .find_map(|t| vocab.get(*t).copied())
            .unwrap_or(0);
        Self { inner, pad_token_id }
    }

    /// Encode `text` with special tokens, truncated and right-padded to
    /// exactly `max_length` positions. Padding positions carry a zero
    /// attention mask so the encoder ignores them.
    pub fn encode(&self, text: &str, max_length: usize) -> CoreResult<EncodedText> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| CoreError::Tokenizer(e.to_string()))?;

        let mut ids: Vec<u32> = encoding.get_ids().to_vec();
        let mut type_ids: Vec<u32> = encoding.get_type_ids().to_vec();
        let mut attention_mask: Vec<u32> = encoding.get_attention_mask().to_vec();

        ids.truncate(max_length);
        type_ids.truncate(max_length);
        attention_mask.truncate(max_length);

        while ids.len() < max_length {
            ids.push(self.pad_token_id);
            type_ids.push(0);
            attention_mask.push(0);
        }

        Ok(EncodedText { ids, type_ids, attention_mask })
    }

    pub fn pad_token_id(&self) -> u32 {
        self.pad_token_id
    }

    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenizers::models::wordlevel::WordLevel;
    use tokenizers::pre_tokenizers::whitespace::Whitespace;

    /// A tiny whitespace word-level tokenizer; enough to test the shaping.
    fn tiny_tokenizer() -> Tokenizer {
        let vocab = [
            ("[PAD]", 0u32),
            ("[UNK]", 1),
            ("hello", 2),
            ("world", 3),
            ("promotion", 4),
        ]
        .into_iter()
        .map(|(t, i)| (t.to_string(), i))
        .collect();
        let model = WordLevel::builder()
            .vocab(vocab)
            .unk_token("[UNK]".to_string())
            .build()
            .unwrap();
        let mut inner = HfTokenizer::new(model);
        inner.with_pre_tokenizer(Some(Whitespace));
        Tokenizer::new(inner)
    }

    #[test]
    fn pads_to_max_length() {
        let tok = tiny_tokenizer();
        let enc = tok.encode("hello world", 8).unwrap();
        assert_eq!(enc.ids.len(), 8);
        assert_eq!(enc.type_ids.len(), 8);
        assert_eq!(enc.attention_mask.len(), 8);
        assert_eq!(&enc.ids[..2], &[2, 3]);
        assert_eq!(&enc.ids[2..], &[0; 6]);
        assert_eq!(&enc.attention_mask[..2], &[1, 1]);
        assert_eq!(&enc.attention_mask[2..], &[0; 6]);
    }

    #[test]
    fn truncates_to_max_length() {
        let tok = tiny_tokenizer();
        let enc = tok.encode("hello world hello world hello", 3).unwrap();
        assert_eq!(enc.ids.len(), 3);
        assert_eq!(enc.attention_mask, vec![1, 1, 1]);
    }

    #[test]
    fn empty_text_is_all_padding() {
        let tok = tiny_tokenizer();
        let enc = tok.encode("", 4).unwrap();
        assert_eq!(enc.ids, vec![0; 4]);
        assert_eq!(enc.attention_mask, vec![0; 4]);
    }

    #[test]
    fn pad_token_discovered_from_vocab() {
        let tok = tiny_tokenizer();
        assert_eq!(tok.pad_token_id(), 0);
        assert_eq!(tok.vocab_size(), 5);
    }
}
