/// Cap on compared characters. Subtitle lines are short and the LCS table is
/// quadratic; anything past the cap is compared by its leading window only.
const MAX_COMPARE_CHARS: usize = 128;

/// Similarity of two normalized texts in [0, 1].
///
/// Scored as `2 * lcs(a, b) / (|a| + |b|)` over characters, with an equality
/// fast path. The denominator makes length ratio part of the score:
/// incremental reveal ("今天" then "今天天气") stays high, while a short new
/// line that happens to be a substring of a long old one scores low, so bare
/// containment cannot misclassify it as a continuation. Single-character OCR
/// substitutions cost one match and little score.
pub fn score(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let ca: Vec<char> = a.chars().take(MAX_COMPARE_CHARS).collect();
    let cb: Vec<char> = b.chars().take(MAX_COMPARE_CHARS).collect();
    let lcs = lcs_len(&ca, &cb);
    (2.0 * lcs as f64) / ((ca.len() + cb.len()) as f64)
}

/// Longest common subsequence length, single-row DP.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for &x in a {
        for (j, &y) in b.iter().enumerate() {
            cur[j + 1] = if x == y {
                prev[j] + 1
            } else {
                cur[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
        cur[0] = 0;
    }
    prev[b.len()]
}
