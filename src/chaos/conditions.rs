//! Fault condition builders
//!
//! Produces the patch documents and command lines the primitives send to the
//! cluster and to the local network control utility.

use serde_json::json;

use crate::k8s::{PatchOp, PatchOperation, ResourcePatch};

/// Directory that receives the disk-pressure file
pub const DISK_PRESSURE_DIR: &str = "/data";

/// File written by the disk-pressure fault
pub const DISK_PRESSURE_FILE: &str = "/data/testfile";

/// Grace period used when evicting pods off a node
pub const EVICTION_GRACE_PERIOD_SECONDS: u32 = 0;

/// Path of a resource limit on the container at `index`
pub fn limit_path(index: usize, resource: &str) -> String {
    format!("/spec/containers/{}/resources/limits/{}", index, resource)
}

/// Build a JSON patch with one `replace` per provided limit.
///
/// Limits passed as `None` get no operation and stay as they are.
pub fn resource_limit_patch(
    container_index: usize,
    cpu: Option<&str>,
    memory: Option<&str>,
) -> ResourcePatch {
    let mut patch = ResourcePatch::default();

    for (resource, value) in [("cpu", cpu), ("memory", memory)] {
        if let Some(value) = value {
            patch.push(PatchOperation {
                op: PatchOp::Replace,
                path: limit_path(container_index, resource),
                value: Some(json!(value)),
            });
        }
    }

    patch
}

/// Wrap a command line for `/bin/sh -c`
pub fn shell_command(command: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), command.to_string()]
}

/// Idempotently create the disk-pressure directory
pub fn ensure_dir_command() -> String {
    format!("mkdir -p {}", DISK_PRESSURE_DIR)
}

/// Write `size_mb` megabytes of zeros to the disk-pressure file
pub fn fill_disk_command(size_mb: u64) -> String {
    format!(
        "dd if=/dev/zero of={} bs=1M count={}",
        DISK_PRESSURE_FILE, size_mb
    )
}

/// Arguments for `tc` adding a netem delay as the root qdisc
pub fn netem_add_args(interface: &str, delay_ms: u32) -> Vec<String> {
    let delay = format!("{}ms", delay_ms);
    let args = [
        "qdisc", "add", "dev", interface, "root", "netem", "delay", delay.as_str(),
    ];
    args.iter().map(|s| s.to_string()).collect()
}

/// Arguments for `tc` removing the root qdisc
pub fn netem_del_args(interface: &str) -> Vec<String> {
    ["qdisc", "del", "dev", interface, "root"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
