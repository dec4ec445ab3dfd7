// ABOUTME: Counters for routing, reconciliation, and presence activity
// ABOUTME: Thin wrappers over the `metrics` facade; no exporter is installed by the core

use metrics::counter;

pub fn record_interaction(outcome: &'static str) {
    counter!("skidbot_interactions_total", "outcome" => outcome).increment(1);
}

pub fn record_role_created() {
    counter!("skidbot_marker_roles_created_total").increment(1);
}

pub fn record_role_granted() {
    counter!("skidbot_marker_roles_granted_total").increment(1);
}

pub fn record_presence_tick(result: &'static str) {
    counter!("skidbot_presence_ticks_total", "result" => result).increment(1);
}

pub fn record_notice_posted() {
    counter!("skidbot_marker_notices_total").increment(1);
}

pub fn record_flag_read_failure() {
    counter!("skidbot_flag_read_failures_total").increment(1);
}

pub fn record_task_failure(severity: &'static str) {
    counter!("skidbot_task_failures_total", "severity" => severity).increment(1);
}
