use std::collections::HashSet;

/// deterministic output file names for one run.
#[derive(Debug, Clone)]
pub struct OutputNaming {
    anime: String,
    final_episode: Option<String>,
}

impl OutputNaming {
    pub fn new(anime: &str) -> Self {
        Self {
            anime: sanitize(anime),
            final_episode: None,
        }
    }

    /// marks `episode` as the last of the series; its file gets an `[END]` tag.
    pub fn final_episode(mut self, episode: impl Into<String>) -> Self {
        self.final_episode = Some(episode.into());
        self
    }

    /// `<anime>-ep-<n>.mp4`, or `<anime>-ep-<n> [END].mp4` for the final episode.
    pub fn file_name(&self, episode: &str) -> String {
        let episode_part = sanitize(episode);
        let tag = if self.final_episode.as_deref() == Some(episode) {
            " [END]"
        } else {
            ""
        };
        format!("{}-ep-{episode_part}{tag}.mp4", self.anime)
    }

    /// like [`Self::file_name`] but suffixed until it is not in `taken`.
    pub fn unique_file_name(&self, episode: &str, taken: &mut HashSet<String>) -> String {
        let base = self.file_name(episode);
        if taken.insert(base.clone()) {
            return base;
        }

        let (stem, ext) = base
            .rsplit_once('.')
            .map(|(s, e)| (s.to_string(), format!(".{e}")))
            .unwrap_or((base.clone(), String::new()));

        let mut n = 2usize;
        loop {
            let candidate = format!("{stem}-{n}{ext}");
            if taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim_matches('.').trim();
    if cleaned.is_empty() {
        "anime".to_string()
    } else {
        cleaned.to_string()
    }
}
