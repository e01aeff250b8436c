/// Label normalisation and CJK-aware tokenisation shared by the matcher,
/// the synonym table and the semantic classifier.
use jieba_rs::Jieba;
use once_cell::sync::Lazy;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

static JIEBA: Lazy<Jieba> = Lazy::new(Jieba::new);

/// Function words that never carry label meaning and split CJK runs.
const STOPWORDS: &[char] = &['的', '了', '在', '是', '和', '与', '或', '及'];

pub fn is_han(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF   // CJK Unified Ideographs
        | 0x3400..=0x4DBF // Extension A
        | 0xF900..=0xFAFF // Compatibility Ideographs
    )
}

/// NFKC fold, lowercase, and drop everything that is not a letter or digit.
/// Full-width forms and decorations such as `*` or `：` disappear.
pub fn normalize_label(text: &str) -> String {
    text.nfkc()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Keyword tokens: latin words split on `_`/`-`, CJK runs cut into words
/// by the jieba dictionary. Tokens shorter than two characters are dropped,
/// duplicates keep their first position.
pub fn tokenize(text: &str) -> Vec<String> {
    let folded: String = text.nfkc().flat_map(char::to_lowercase).collect();
    let mut raw: Vec<String> = Vec::new();
    let mut han_run: Vec<char> = Vec::new();

    for segment in folded.split_word_bounds() {
        if segment.chars().all(|c| is_han(c) && !STOPWORDS.contains(&c)) {
            han_run.extend(segment.chars());
            continue;
        }
        flush_han_run(&mut han_run, &mut raw);
        if segment.chars().any(char::is_alphanumeric) {
            raw.extend(
                segment
                    .split(['_', '-'])
                    .map(|part| part.chars().filter(|c| c.is_alphanumeric()).collect::<String>()),
            );
        }
    }
    flush_han_run(&mut han_run, &mut raw);

    let mut tokens: Vec<String> = Vec::with_capacity(raw.len());
    for token in raw {
        if char_len(&token) >= 2 && !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

fn flush_han_run(run: &mut Vec<char>, out: &mut Vec<String>) {
    if !run.is_empty() {
        let text: String = run.iter().collect();
        out.extend(JIEBA.cut(&text, false).into_iter().map(str::to_string));
    }
    run.clear();
}
