//! Storage key helpers.
//!
//! Keys are slash-joined storage paths, not filesystem paths; everything
//! here is pure and deterministic.

/// Width ids are zero-padded to before partitioning.
pub(crate) const PARTITION_PAD_WIDTH: usize = 8;

/// Characters per partition group.
pub(crate) const PARTITION_GROUP_LEN: usize = 4;

/// Sanitize a filename for use as the final storage key segment.
///
/// Takes the last path component (both `/` and `\` count as separators),
/// then maps every character outside `[A-Za-z0-9._-]` to `_`. Idempotent,
/// and the result can never contain a separator, so a derived key cannot
/// escape its base path.
#[must_use]
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or("");

    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Zero-pad a path id to the partition width. Ids already wider than the
/// partition width are left unchanged.
pub(crate) fn pad_path_id(id: &str) -> String {
    format!("{id:0>width$}", width = PARTITION_PAD_WIDTH)
}

/// Split a padded path id into partition groups. A short final group is
/// kept rather than dropped so distinct ids can never collide.
pub(crate) fn partition_groups(padded: &str) -> Vec<String> {
    padded
        .chars()
        .collect::<Vec<_>>()
        .chunks(PARTITION_GROUP_LEN)
        .map(|group| group.iter().collect())
        .collect()
}

/// Join non-empty segments with `/`.
pub(crate) fn join_key<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    segments
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
