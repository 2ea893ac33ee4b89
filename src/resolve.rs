use url::Url;

use crate::error::{Error, Result};
use crate::models::Golink;
use crate::store::GolinkStore;

/// Outcome of a successful resolution: the matched golink and how many
/// leading path segments its name consumed.
#[derive(Debug)]
pub struct Resolution {
    pub golink: Golink,
    pub matched_segments: usize,
}

/// Deterministic name → storage-key transform.
///
/// Percent-encodes every byte outside the unreserved set, so `/` inside a
/// name (`requests/org` → `requests%2Forg`) can never collide with a key
/// built from a different segment split, and candidate keys can be rebuilt
/// from raw path segments at any join length.
pub fn name_to_id(name: &str) -> String {
    urlencoding::encode(name).into_owned()
}

/// Find the golink matching the longest possible prefix of `segments`.
///
/// Trying the longest candidate first is what lets names themselves contain
/// `/` while trailing segments still pass through to the target. A store
/// failure that is not "record absent" aborts the scan immediately —
/// falling back to a shorter prefix would mask the fault.
pub async fn resolve(store: &dyn GolinkStore, segments: &[String]) -> Result<Option<Resolution>> {
    for count in (1..=segments.len()).rev() {
        let candidate = segments[..count].join("/");
        if let Some(golink) = store.get(&candidate).await? {
            return Ok(Some(Resolution {
                golink,
                matched_segments: count,
            }));
        }
    }

    Ok(None)
}

/// Expand a stored target URL with the path segments left over after the
/// name match.
///
/// A target containing `{{` is a template: each `{{k}}` is replaced with
/// the query-escaped k-th remaining segment (1-indexed). Segments beyond
/// the highest placeholder are dropped; placeholders with no segment stay
/// verbatim. A plain target falls back to legacy behavior — remaining
/// segments are appended to its path. Either way the stored URL must
/// parse; one that doesn't is fatal for the request.
pub fn expand_target(target: &str, remaining: &[String]) -> Result<String> {
    let mut parsed = Url::parse(target).map_err(|source| Error::InvalidUrl {
        url: target.to_owned(),
        source,
    })?;

    if target.contains("{{") {
        let mut expanded = target.to_owned();
        for (index, segment) in remaining.iter().enumerate() {
            let placeholder = format!("{{{{{}}}}}", index + 1);
            expanded = expanded.replace(&placeholder, &urlencoding::encode(segment));
        }
        return Ok(expanded);
    }

    if remaining.is_empty() {
        return Ok(target.to_owned());
    }

    // Url normalizes an absent path to "/"; strip that so a host-only
    // target doesn't pick up a double slash.
    let base = match parsed.path() {
        "/" => String::new(),
        path => path.to_owned(),
    };
    parsed.set_path(&format!("{}/{}", base, remaining.join("/")));

    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;

    fn segments(path: &str) -> Vec<String> {
        path.split('/').map(str::to_owned).collect()
    }

    fn golink(name: &str, url: &str) -> Golink {
        Golink::new(name.into(), url.into(), vec!["alice@example.com".into()])
    }

    // ── name_to_id ─────────────────────────────────────────────────────────

    #[test]
    fn name_to_id_escapes_separators() {
        assert_eq!(name_to_id("go"), "go");
        assert_eq!(name_to_id("requests/org"), "requests%2Forg");
        // Escaping keeps distinct names distinct.
        assert_ne!(name_to_id("a/b"), name_to_id("a%2Fb"));
    }

    // ── resolve ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn longest_prefix_wins() {
        let store = MemoryStore::new();
        store.create(&golink("a", "https://short.test")).await.unwrap();
        store.create(&golink("a/b/c", "https://long.test")).await.unwrap();

        let hit = resolve(&store, &segments("a/b/c/extra"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.matched_segments, 3);
        assert_eq!(hit.golink.name, "a/b/c");

        let hit = resolve(&store, &segments("a/x")).await.unwrap().unwrap();
        assert_eq!(hit.matched_segments, 1);
        assert_eq!(hit.golink.name, "a");
    }

    #[tokio::test]
    async fn no_prefix_matches() {
        let store = MemoryStore::new();
        store.create(&golink("other", "https://x.test")).await.unwrap();

        assert!(resolve(&store, &segments("missing/path"))
            .await
            .unwrap()
            .is_none());
    }

    /// Store that fails lookups for one specific name.
    struct FaultyStore {
        inner: MemoryStore,
        poison: String,
    }

    #[async_trait]
    impl GolinkStore for FaultyStore {
        async fn get(&self, name: &str) -> Result<Option<Golink>> {
            if name == self.poison {
                return Err(Error::Store("backend unreachable".into()));
            }
            self.inner.get(name).await
        }

        async fn get_versioned(
            &self,
            name: &str,
        ) -> Result<Option<(Golink, crate::store::Version)>> {
            self.inner.get_versioned(name).await
        }

        async fn create(&self, golink: &Golink) -> Result<()> {
            self.inner.create(golink).await
        }

        async fn compare_and_update(
            &self,
            expected: crate::store::Version,
            golink: &Golink,
        ) -> Result<bool> {
            self.inner.compare_and_update(expected, golink).await
        }

        async fn delete(&self, name: &str) -> Result<bool> {
            self.inner.delete(name).await
        }

        async fn rename(&self, old_name: &str, new_name: &str) -> Result<Golink> {
            self.inner.rename(old_name, new_name).await
        }

        async fn list_all(&self) -> Result<Vec<Golink>> {
            self.inner.list_all().await
        }

        async fn list_by_owner(&self, owner: &str) -> Result<Vec<Golink>> {
            self.inner.list_by_owner(owner).await
        }

        async fn list_by_url(&self, url: &str) -> Result<Vec<Golink>> {
            self.inner.list_by_url(url).await
        }

        async fn list_popular(
            &self,
            window: crate::models::PopularWindow,
            limit: u32,
        ) -> Result<Vec<Golink>> {
            self.inner.list_popular(window, limit).await
        }
    }

    #[tokio::test]
    async fn lookup_fault_aborts_scan() {
        // "a" exists, but the two-segment candidate fails first. The scan
        // must propagate the fault instead of falling back to "a".
        let store = FaultyStore {
            inner: MemoryStore::new(),
            poison: "a/b".into(),
        };
        store.create(&golink("a", "https://a.test")).await.unwrap();

        let err = resolve(&store, &segments("a/b")).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    // ── expand_target ──────────────────────────────────────────────────────

    #[test]
    fn template_replaces_positional_placeholders() {
        let target = expand_target(
            "https://example.com/{{1}}/{{2}}",
            &segments("foo/bar"),
        )
        .unwrap();
        assert_eq!(target, "https://example.com/foo/bar");
    }

    #[test]
    fn template_leaves_unmatched_placeholders_verbatim() {
        let target = expand_target("https://example.com/{{1}}/{{2}}", &segments("foo")).unwrap();
        assert_eq!(target, "https://example.com/foo/{{2}}");
    }

    #[test]
    fn template_drops_segments_past_last_placeholder() {
        let target = expand_target(
            "https://example.com/{{1}}",
            &segments("foo/ignored/also-ignored"),
        )
        .unwrap();
        assert_eq!(target, "https://example.com/foo");
    }

    #[test]
    fn template_escapes_segment_values() {
        let target = expand_target(
            "https://example.com/search?q={{1}}",
            &["a b&c".to_owned()],
        )
        .unwrap();
        assert_eq!(target, "https://example.com/search?q=a%20b%26c");
    }

    #[test]
    fn template_replaces_repeated_placeholder() {
        let target =
            expand_target("https://example.com/{{1}}/x/{{1}}", &segments("v")).unwrap();
        assert_eq!(target, "https://example.com/v/x/v");
    }

    #[test]
    fn legacy_appends_remaining_segments() {
        let target =
            expand_target("https://example.com/base", &segments("extra/seg")).unwrap();
        assert_eq!(target, "https://example.com/base/extra/seg");
    }

    #[test]
    fn legacy_handles_host_only_target() {
        let target = expand_target("https://example.com", &segments("extra")).unwrap();
        assert_eq!(target, "https://example.com/extra");
    }

    #[test]
    fn legacy_keeps_query_and_fragment() {
        let target =
            expand_target("https://example.com/base?tab=1#top", &segments("x")).unwrap();
        assert_eq!(target, "https://example.com/base/x?tab=1#top");
    }

    #[test]
    fn legacy_without_remaining_segments_is_unchanged() {
        let target = expand_target("https://example.com/base", &[]).unwrap();
        assert_eq!(target, "https://example.com/base");
    }

    #[test]
    fn malformed_target_is_fatal() {
        let err = expand_target("not a url", &segments("x")).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));

        // Also fatal in template mode — the parse happens before branching.
        let err = expand_target("not a url {{1}}", &segments("x")).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }
}
