//! Content quality gate (§4.2, §4.6): shared between record creation
//! (reject at the door) and the lifecycle pruning sweep (flag survivors
//! that would no longer pass if re-submitted today).

const MIN_CONTENT_LENGTH: usize = 20;

/// `Err` carries a human-readable reason; callers surface it as a
/// validation error or a prune candidate, depending on context.
pub fn passes_quality_gate(content: &str, junk_fingerprints: &[String]) -> Result<(), String> {
    let trimmed = content.trim();
    if trimmed.chars().count() < MIN_CONTENT_LENGTH {
        return Err(format!(
            "content shorter than minimum length ({} < {MIN_CONTENT_LENGTH})",
            trimmed.chars().count()
        ));
    }
    for fingerprint in junk_fingerprints {
        if trimmed.contains(fingerprint.as_str()) {
            return Err(format!("content matches junk fingerprint: {fingerprint}"));
        }
    }
    Ok(())
}
