/// Relevance scoring via ROUGE-L (longest-common-subsequence F-measure)
/// between source text and generated summary (§4.4 step 3). This supersedes
/// the collected system's original placeholder relevance metric
/// (`len(summary)/len(text)`, explicitly marked for improvement there);
/// ROUGE-L actually measures how much of the summary's content traces back
/// to the source, rather than just a length ratio.
pub fn rouge_l_f1(source: &str, summary: &str) -> f64 {
    let source_tokens: Vec<&str> = source.split_whitespace().collect();
    let summary_tokens: Vec<&str> = summary.split_whitespace().collect();

    if source_tokens.is_empty() || summary_tokens.is_empty() {
        return 0.0;
    }

    let lcs_len = longest_common_subsequence_len(&source_tokens, &summary_tokens);
    if lcs_len == 0 {
        return 0.0;
    }

    let recall = lcs_len as f64 / source_tokens.len() as f64;
    let precision = lcs_len as f64 / summary_tokens.len() as f64;

    if recall + precision == 0.0 {
        return 0.0;
    }

    // beta=1 (F1): harmonic mean of precision and recall.
    (2.0 * precision * recall) / (precision + recall)
}

fn longest_common_subsequence_len(a: &[&str], b: &[&str]) -> usize {
    let (n, m) = (a.len(), b.len());
    let mut dp = vec![0usize; m + 1];
    for i in 1..=n {
        let mut prev_diag = 0;
        for j in 1..=m {
            let temp = dp[j];
            if a[i - 1] == b[j - 1] {
                dp[j] = prev_diag + 1;
            } else {
                dp[j] = dp[j].max(dp[j - 1]);
            }
            prev_diag = temp;
        }
    }
    dp[m]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_scores_one() {
        let text = "the quick brown fox jumps over the lazy dog";
        assert!((rouge_l_f1(text, text) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_text_scores_zero() {
        assert_eq!(rouge_l_f1("alpha beta gamma", "delta epsilon zeta"), 0.0);
    }

    #[test]
    fn partial_overlap_in_between() {
        let source = "rust async runtimes tokio executors schedule tasks efficiently";
        let summary = "tokio schedules tasks efficiently";
        let score = rouge_l_f1(source, summary);
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn empty_inputs_score_zero() {
        assert_eq!(rouge_l_f1("", "summary"), 0.0);
        assert_eq!(rouge_l_f1("source", ""), 0.0);
    }
}
