use crate::similarity::{NameScorer, SequenceRatio};
use albumdiff_common::{AlbumPairing, LibraryComparison, Snapshot, DEFAULT_SIMILARITY_THRESHOLD};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Candidate pools at least this large are scored in parallel
const PARALLEL_SCAN_MIN: usize = 256;

/// Reconciles a OneDrive snapshot against a Google Photos snapshot
pub struct LibraryComparator<S = SequenceRatio> {
    scorer: S,
    similarity_threshold: f64,
}

impl LibraryComparator<SequenceRatio> {
    /// `similarity_threshold` must lie in `[0, 1]`
    pub fn new(similarity_threshold: f64) -> Self {
        Self::with_scorer(SequenceRatio, similarity_threshold)
    }
}

impl Default for LibraryComparator<SequenceRatio> {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl<S: NameScorer> LibraryComparator<S> {
    pub fn with_scorer(scorer: S, similarity_threshold: f64) -> Self {
        Self {
            scorer,
            similarity_threshold,
        }
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        self.scorer.score(a, b)
    }

    /// Pair album names across the two snapshots.
    ///
    /// OneDrive names are visited in ascending order. Each one claims the
    /// unclaimed Google name with the highest score strictly above the
    /// threshold; on equal scores the alphabetically earlier Google name
    /// wins. Claims are final, so the result is greedy rather than a global
    /// optimum.
    pub fn match_albums(&self, onedrive: &Snapshot, google: &Snapshot) -> AlbumPairing {
        let mut pairing = AlbumPairing::new();
        let candidates: Vec<&str> = google.names().collect();

        for od_name in onedrive.names() {
            let open: Vec<&str> = candidates
                .iter()
                .copied()
                .filter(|gp_name| !pairing.contains_google(gp_name))
                .collect();

            if let Some(gp_name) = self.best_candidate(od_name, &open) {
                debug!("Matched '{}' -> '{}'", od_name, gp_name);
                pairing.insert(od_name, gp_name);
            }
        }

        pairing
    }

    fn best_candidate<'a>(&self, name: &str, candidates: &[&'a str]) -> Option<&'a str> {
        let scores: Vec<f64> = if candidates.len() >= PARALLEL_SCAN_MIN {
            candidates
                .par_iter()
                .map(|candidate| self.scorer.score(name, candidate))
                .collect()
        } else {
            candidates
                .iter()
                .map(|candidate| self.scorer.score(name, candidate))
                .collect()
        };

        let mut best_match = None;
        let mut best_score = self.similarity_threshold;
        for (candidate, score) in candidates.iter().zip(scores) {
            if score > best_score {
                best_score = score;
                best_match = Some(*candidate);
            }
        }
        best_match
    }

    /// Derive the discrepancy lists from a pairing.
    ///
    /// Every name in `pairing` must exist in its snapshot.
    pub fn classify(
        &self,
        onedrive: Arc<Snapshot>,
        google: Arc<Snapshot>,
        pairing: AlbumPairing,
    ) -> LibraryComparison {
        let missing_in_google: Vec<String> = onedrive
            .names()
            .filter(|name| !pairing.contains_onedrive(name))
            .map(str::to_string)
            .collect();

        let missing_in_onedrive: Vec<String> = google
            .names()
            .filter(|name| !pairing.contains_google(name))
            .map(str::to_string)
            .collect();

        let mut count_mismatches = BTreeMap::new();
        for (od_name, gp_name) in pairing.iter() {
            let od_count = onedrive.get(od_name).map_or(0, |a| a.item_count);
            let gp_count = google.get(gp_name).map_or(0, |a| a.item_count);
            if od_count != gp_count {
                count_mismatches.insert(od_name.to_string(), (od_count, gp_count));
            }
        }

        LibraryComparison::new(
            onedrive,
            google,
            pairing,
            missing_in_google,
            missing_in_onedrive,
            count_mismatches,
        )
    }

    /// Match and classify in one step
    pub fn compare(&self, onedrive: Arc<Snapshot>, google: Arc<Snapshot>) -> LibraryComparison {
        info!(
            "Comparing {} OneDrive albums with {} Google Photos albums",
            onedrive.len(),
            google.len()
        );

        let pairing = self.match_albums(&onedrive, &google);
        let comparison = self.classify(onedrive, google, pairing);

        debug!(
            "Matched {} albums, {} count mismatches",
            comparison.pairing().len(),
            comparison.count_mismatches().len()
        );
        comparison
    }
}
