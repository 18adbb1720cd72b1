use sha1::{Digest, Sha1};

const ID_LEN: usize = 32;

/// Derive an opaque, fixed-length key from `input`.
pub fn identity(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(ID_LEN);
    hex
}

pub fn show_id(feed_url: &str) -> String {
    identity(feed_url)
}

/// Episode key from the feed URL and the item title.
///
/// An edited title yields a different key.
pub fn episode_id(feed_url: &str, title: &str) -> String {
    let mut input = String::with_capacity(feed_url.len() + title.len());
    input.push_str(feed_url);
    input.push_str(title);
    identity(&input)
}

pub fn episode_id_from_guid(feed_url: &str, guid: &str) -> String {
    identity(&format!("{feed_url}#guid:{guid}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_deterministic_and_fixed_length() {
        let a = identity("https://example.com/show/rss");
        let b = identity("https://example.com/show/rss");
        assert_eq!(a, b);
        assert_eq!(a.len(), ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn known_digest_prefix() {
        // sha1("abc") = a9993e364706816aba3e25717850c26c9cd0d89d
        assert_eq!(identity("abc"), "a9993e364706816aba3e25717850c26c");
    }

    #[test]
    fn distinct_inputs_give_distinct_ids() {
        let url = "https://example.com/show/rss";
        let ids = [
            show_id(url),
            episode_id(url, "Pilot"),
            episode_id(url, "Episode 2"),
            episode_id("https://example.com/other/rss", "Pilot"),
            episode_id_from_guid(url, "Pilot"),
        ];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn episode_id_is_hash_of_concatenation() {
        let url = "https://example.com/show/rss";
        assert_eq!(episode_id(url, "Pilot"), identity(&format!("{url}Pilot")));
    }
}
