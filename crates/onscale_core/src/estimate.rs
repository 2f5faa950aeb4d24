use serde::{Deserialize, Serialize};

use crate::constants::defaults::MNMPI_PARTS_THRESHOLD;
use crate::job::Precision;

/// Body of `POST /job/estimate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRequest {
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_id: Option<String>,
    pub main_file: String,
    pub solver: String,
    pub precision: Precision,
    pub docker_tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_tag_id: Option<String>,
    pub application: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_blobs: Vec<String>,
}

/// Acknowledgement returned when an estimate is requested. Results arrive on the user socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EstimateTicket {
    pub estimate_id: Option<String>,
    pub job_id: Option<String>,
}

/// Candidate configurations computed by the platform estimator.
///
/// The vectors are parallel: index `i` of each describes candidate `i`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResults {
    pub estimate_id: String,
    pub number_of_cores: Vec<u32>,
    /// Bytes.
    pub estimated_memory: Vec<u64>,
    /// Seconds.
    pub estimated_run_times: Vec<f64>,
    pub parts_count: Option<Vec<u32>>,
    #[serde(rename = "type", default)]
    pub estimate_type: String,
    #[serde(default)]
    pub estimate_hashes: Vec<String>,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// One concrete configuration picked out of [`EstimateResults`].
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateOption {
    pub estimate_id: String,
    pub cores: u32,
    pub memory: u64,
    pub run_time: f64,
    pub parts: u32,
    pub estimate_type: String,
    pub hash: Option<String>,
    /// Core hours.
    pub cost: f64,
    pub parameters: serde_json::Value,
}

impl EstimateResults {
    pub fn len(&self) -> usize {
        self.number_of_cores
            .len()
            .min(self.estimated_memory.len())
            .min(self.estimated_run_times.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Candidate `idx` with cores and parts normalised the way the platform runs them.
    ///
    /// Above 31 parts a job is multi-node and needs two cores per part. Core counts are
    /// always even and the part count is half the cores.
    pub fn option(&self, idx: usize) -> Option<EstimateOption> {
        if idx >= self.len() {
            return None;
        }
        let reported_parts = self
            .parts_count
            .as_ref()
            .and_then(|p| p.get(idx).copied())
            .unwrap_or(0);
        let mut cores = if reported_parts > MNMPI_PARTS_THRESHOLD {
            reported_parts * 2
        } else {
            self.number_of_cores[idx]
        };
        if cores % 2 == 1 {
            cores += 1;
        }
        let run_time = self.estimated_run_times[idx];

        Some(EstimateOption {
            estimate_id: self.estimate_id.clone(),
            cores,
            memory: self.estimated_memory[idx],
            run_time,
            parts: cores / 2,
            estimate_type: self.estimate_type.clone(),
            hash: self.estimate_hashes.get(idx).cloned(),
            cost: f64::from(cores) * run_time / 3600.0,
            parameters: self.parameters.clone(),
        })
    }

    pub fn options(&self) -> impl Iterator<Item = EstimateOption> + '_ {
        (0..self.len()).filter_map(|idx| self.option(idx))
    }

    /// The cheapest candidate costing at most `max_spend`.
    ///
    /// With `parts`, candidates with at least that many parts are preferred. If none of them
    /// fits the budget, the cheapest affordable candidate with fewer parts is returned.
    pub fn nearest(&self, max_spend: f64, parts: Option<u32>) -> Option<EstimateOption> {
        let affordable = || self.options().filter(|o| o.cost <= max_spend);

        let preferred = affordable()
            .filter(|o| parts.is_none_or(|p| o.parts >= p))
            .min_by(|a, b| a.cost.total_cmp(&b.cost));

        preferred.or_else(|| {
            let p = parts?;
            affordable()
                .filter(|o| o.parts <= p)
                .min_by(|a, b| a.cost.total_cmp(&b.cost).then(b.parts.cmp(&a.parts)))
        })
    }

    pub fn lowest_core_hour_spend(&self, parts: Option<u32>) -> Option<EstimateOption> {
        self.options()
            .filter(|o| parts.is_none_or(|p| o.parts >= p))
            .min_by(|a, b| a.cost.total_cmp(&b.cost))
    }

    pub fn quickest_run_time(&self, parts: Option<u32>) -> Option<EstimateOption> {
        self.options()
            .filter(|o| parts.is_none_or(|p| o.parts >= p))
            .min_by(|a, b| a.run_time.total_cmp(&b.run_time))
    }
}

/// A message pushed on the user socket while an estimate runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "messagetype", rename_all = "lowercase")]
pub enum EstimateEvent {
    Status {
        #[serde(default)]
        status: String,
    },
    Progress {
        #[serde(default)]
        finished: u64,
        #[serde(default)]
        total: u64,
    },
    Results(EstimateResults),
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

impl EstimateEvent {
    /// `status` messages with `failed` end the estimate without results.
    pub fn is_failure(&self) -> bool {
        match self {
            EstimateEvent::Status { status } => status.eq_ignore_ascii_case("failed"),
            EstimateEvent::Error { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results() -> EstimateResults {
        EstimateResults {
            estimate_id: "est-1".into(),
            number_of_cores: vec![2, 4, 8, 16],
            estimated_memory: vec![1_000, 2_000, 4_000, 8_000],
            estimated_run_times: vec![3600.0, 1800.0, 1200.0, 900.0],
            parts_count: Some(vec![1, 2, 4, 8]),
            estimate_type: "FLEX".into(),
            estimate_hashes: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            parameters: serde_json::Value::Null,
        }
    }

    #[test]
    fn option_computes_core_hours() {
        let o = results().option(1).unwrap();
        assert_eq!(o.cores, 4);
        assert_eq!(o.parts, 2);
        assert!((o.cost - 2.0).abs() < 1e-9);
        assert_eq!(o.hash.as_deref(), Some("b"));
        assert!(results().option(4).is_none());
    }

    #[test]
    fn option_normalises_multi_node_and_odd_cores() {
        let r = EstimateResults {
            number_of_cores: vec![3, 40],
            estimated_memory: vec![1, 1],
            estimated_run_times: vec![3600.0, 3600.0],
            parts_count: Some(vec![3, 40]),
            ..results()
        };
        let odd = r.option(0).unwrap();
        assert_eq!((odd.cores, odd.parts), (4, 2));
        let multi = r.option(1).unwrap();
        assert_eq!((multi.cores, multi.parts), (80, 40));
    }

    #[test]
    fn nearest_picks_cheapest_under_budget() {
        // costs: 2.0, 2.0, 2.666.., 4.0
        let best = results().nearest(5.0, None).unwrap();
        assert!((best.cost - 2.0).abs() < 1e-9);
        assert!(results().nearest(1.0, None).is_none());
    }

    #[test]
    fn nearest_accepts_a_cost_equal_to_the_budget() {
        let best = results().nearest(2.0, None).unwrap();
        assert!((best.cost - 2.0).abs() < 1e-9);

        let exact = results().nearest(4.0, Some(8)).unwrap();
        assert_eq!(exact.parts, 8);
    }

    #[test]
    fn nearest_honours_parts_then_falls_back() {
        let best = results().nearest(5.0, Some(4)).unwrap();
        assert_eq!(best.parts, 4);

        // 8 parts costs 4.0, over budget, so fall back to the cheapest with fewer parts.
        let fallback = results().nearest(3.0, Some(8)).unwrap();
        assert!(fallback.parts < 8);
        assert!(fallback.cost < 3.0);
        assert_eq!(fallback.parts, 2);
    }

    #[test]
    fn lowest_and_quickest() {
        let r = results();
        assert_eq!(r.quickest_run_time(None).unwrap().cores, 16);
        assert_eq!(r.lowest_core_hour_spend(Some(4)).unwrap().cores, 8);
    }

    #[test]
    fn events_parse_by_message_type() {
        let ev: EstimateEvent =
            serde_json::from_str(r#"{"messagetype": "status", "status": "failed"}"#).unwrap();
        assert!(ev.is_failure());

        let ev: EstimateEvent = serde_json::from_str(
            r#"{"messagetype": "results", "estimateId": "e", "numberOfCores": [2],
                "estimatedMemory": [10], "estimatedRunTimes": [60.0], "partsCount": [1],
                "type": "FLEX", "estimateHashes": ["h"], "parameters": {}, "jobId": "j"}"#,
        )
        .unwrap();
        match ev {
            EstimateEvent::Results(r) => assert_eq!(r.len(), 1),
            other => panic!("unexpected event {other:?}"),
        }

        let ev: EstimateEvent =
            serde_json::from_str(r#"{"messagetype": "progress", "finished": 1, "total": 4}"#)
                .unwrap();
        assert!(!ev.is_failure());
    }
}
