use crate::console::Console;
use crate::error::{BenchmarkError, Result};
use crate::logger::LogSink;

use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::Command;

/// GPU vendor found on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuVendor {
    Nvidia,
    Amd,
}

impl GpuVendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            GpuVendor::Nvidia => "NVIDIA",
            GpuVendor::Amd => "AMD",
        }
    }

    /// Suffix selecting the vendor-specific Dockerfile variant.
    pub fn dockerfile_suffix(&self) -> &'static str {
        match self {
            GpuVendor::Nvidia => ".nvidia",
            GpuVendor::Amd => ".amd",
        }
    }
}

/// Host OS family, identified by its package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Ubuntu,
    Centos,
    Sles,
}

impl HostOs {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostOs::Ubuntu => "HOST_UBUNTU",
            HostOs::Centos => "HOST_CENTOS",
            HostOs::Sles => "HOST_SLES",
        }
    }

    /// Suffix selecting the distribution-specific Dockerfile variant.
    pub fn dockerfile_suffix(&self) -> &'static str {
        match self {
            HostOs::Ubuntu => ".ubuntu",
            HostOs::Centos => ".centos",
            HostOs::Sles => ".sles",
        }
    }
}

/// A host directory exposed to a container.
#[derive(Debug, Clone)]
pub struct MountPoint {
    pub host_path: String,
    pub container_path: String,
    pub read_write: bool,
}

/// Detect the GPU vendor by probing the vendor tools, NVIDIA first.
///
/// A tool that is missing or present but failing counts as absent.
pub fn gpu_vendor(log: &dyn LogSink) -> Result<GpuVendor> {
    if tool_runs("/usr/bin/nvidia-smi") {
        log.debug("GPU vendor: NVIDIA");
        return Ok(GpuVendor::Nvidia);
    }
    if tool_runs("/opt/rocm/bin/rocm-smi") {
        log.debug("GPU vendor: AMD");
        return Ok(GpuVendor::Amd);
    }
    Err(BenchmarkError::UnsupportedGpu)
}

fn tool_runs(path: &str) -> bool {
    Command::new(path)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub fn dockerfile_gpu_suffix(log: &dyn LogSink) -> Result<&'static str> {
    Ok(gpu_vendor(log)?.dockerfile_suffix())
}

pub fn host_os(log: &dyn LogSink) -> Result<HostOs> {
    let host_os = if Path::new("/usr/bin/apt").exists() {
        HostOs::Ubuntu
    } else if Path::new("/usr/bin/yum").exists() {
        HostOs::Centos
    } else if Path::new("/usr/bin/zypper").exists() {
        HostOs::Sles
    } else {
        return Err(BenchmarkError::UnsupportedHostOs);
    };

    log.info(&format!("Host OS: {}", host_os.as_str()));
    Ok(host_os)
}

pub fn dockerfile_linux_suffix(log: &dyn LogSink) -> Result<&'static str> {
    Ok(host_os(log)?.dockerfile_suffix())
}

pub fn system_cpus(log: &dyn LogSink) -> usize {
    let number_cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    log.info(&format!("Number of CPUs: {}", number_cpus));
    number_cpus
}

pub fn system_gpus(console: &Console, log: &dyn LogSink) -> Result<usize> {
    let number_gpus = match gpu_vendor(log)? {
        GpuVendor::Nvidia => {
            let output =
                console.sh("nvidia-smi --query-gpu=count --format=csv,noheader | head -n 1")?;
            output.trim().parse::<usize>().map_err(|_| {
                BenchmarkError::Probe(format!("unexpected nvidia-smi GPU count: {}", output))
            })?
        }
        GpuVendor::Amd => {
            let output = console.sh("rocm-smi --showid --csv | grep card | wc -l")?;
            output.trim().parse::<usize>().map_err(|_| {
                BenchmarkError::Probe(format!("unexpected rocm-smi GPU count: {}", output))
            })?
        }
    };

    log.info(&format!("Number of GPUs: {}", number_gpus));
    Ok(number_gpus)
}

const KFD_TOPOLOGY_NODES: &str = "/sys/devices/virtual/kfd/kfd/topology/nodes";

/// Render-node minors for each AMD GPU, ascending. Node 0 is the CPU and is
/// excluded. `None` on NVIDIA hosts.
pub fn gpu_renderd_nodes(log: &dyn LogSink) -> Result<Option<Vec<i64>>> {
    if gpu_vendor(log)? != GpuVendor::Amd {
        return Ok(None);
    }

    let mut gpu_renderds = Vec::new();
    for entry in fs::read_dir(KFD_TOPOLOGY_NODES)? {
        let properties = entry?.path().join("properties");
        if !properties.is_file() {
            continue;
        }
        let content = fs::read_to_string(&properties)?;
        if let Some(minor) = parse_drm_render_minor(&content) {
            if minor != 0 {
                gpu_renderds.push(minor);
            }
        }
    }
    gpu_renderds.sort_unstable();
    Ok(Some(gpu_renderds))
}

/// Extract the `drm_render_minor` value from a topology properties file.
pub fn parse_drm_render_minor(properties: &str) -> Option<i64> {
    for line in properties.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() == Some("drm_render_minor") {
            return parts.next_back().and_then(|value| value.parse().ok());
        }
    }
    None
}

/// Device index range for `docker run`, when any GPU is present.
pub fn docker_gpus(console: &Console, log: &dyn LogSink) -> Result<Option<String>> {
    let number_gpus = system_gpus(console, log)?;
    if number_gpus > 0 {
        return Ok(Some(gpu_index_range(number_gpus)));
    }
    Ok(None)
}

/// `"0-{n-1}"` for `n` GPUs; `n` must be nonzero.
pub fn gpu_index_range(number_gpus: usize) -> String {
    format!("0-{}", number_gpus - 1)
}

/// Architecture token of the first GPU: "A100"/"H100"/"V100"-style for
/// NVIDIA, "gfx908"-style for AMD.
pub fn system_gpu_arch(console: &Console, log: &dyn LogSink) -> Result<String> {
    let gpu_vendor = gpu_vendor(log)?;
    let gpu_arch = match gpu_vendor {
        GpuVendor::Nvidia => {
            let gpu_name = console.sh("nvidia-smi --query-gpu=gpu_name --format=csv,noheader")?;
            parse_nvidia_gpu_arch(&gpu_name)?
        }
        GpuVendor::Amd => {
            let output = console.sh("/opt/rocm/bin/rocminfo | grep -o -m 1 'gfx.*'")?;
            output.trim().to_string()
        }
    };

    log.info(&format!("GPU vendor: {}", gpu_vendor.as_str()));
    log.info(&format!("GPU architecture: {}", gpu_arch));
    Ok(gpu_arch)
}

/// Extract the accelerator generation (Axxx, Hxxx or Vxxx) from an NVIDIA
/// product name.
pub fn parse_nvidia_gpu_arch(gpu_name: &str) -> Result<String> {
    let pattern = Regex::new(r"([AHV])(\d{3})")?;
    match pattern.find(gpu_name) {
        Some(found) => Ok(found.as_str().to_string()),
        None => Err(BenchmarkError::Probe(format!(
            "Failed to get GPU architecture of NVIDIA: {}",
            gpu_name
        ))),
    }
}

/// `docker run` flags granting GPU access for the detected vendor.
pub fn gpu_docker_args(log: &dyn LogSink) -> Result<String> {
    let gpu_args = gpu_docker_args_for(gpu_vendor(log)?);
    log.debug(&format!("GPU Docker arguments: {}", gpu_args));
    Ok(gpu_args)
}

pub fn gpu_docker_args_for(vendor: GpuVendor) -> String {
    match vendor {
        GpuVendor::Nvidia => "--gpus all --shm-size 16g".to_string(),
        GpuVendor::Amd => "--device=/dev/kfd --device=/dev/dri --shm-size 16g".to_string(),
    }
}

/// CPU pinning flag: the requested range, or every CPU on the host.
pub fn cpu_docker_args(request_cpus: Option<&str>, log: &dyn LogSink) -> String {
    let cpu_args = match request_cpus {
        Some(request) => format!("--cpuset-cpus=\"{}\"", request),
        None => format!("--cpuset-cpus=\"0-{}\"", system_cpus(log) - 1),
    };
    log.debug(&format!("CPU Docker arguments: {}", cpu_args));
    cpu_args
}

/// `--env` flags, one per variable.
pub fn env_docker_args(run_envs: Option<&BTreeMap<String, String>>, log: &dyn LogSink) -> String {
    let mut env_args = String::new();
    if let Some(run_envs) = run_envs {
        for (key, value) in run_envs {
            env_args.push_str(&format!("--env {}={} ", key, value));
        }
    }
    log.debug(&format!("Environment Docker arguments: {}", env_args));
    env_args
}

/// `-v` flags, one per mount, `:rw` or `:ro` per its mode.
pub fn mount_docker_args(mount_data_paths: Option<&[MountPoint]>, log: &dyn LogSink) -> String {
    let mut mount_args = String::new();
    if let Some(mount_data_paths) = mount_data_paths {
        for mount in mount_data_paths {
            let mode = if mount.read_write { "rw" } else { "ro" };
            mount_args.push_str(&format!(
                "-v {}:{}:{} ",
                mount.host_path, mount.container_path, mode
            ));
        }
    }
    log.debug(&format!("Mount Docker arguments: {}", mount_args));
    mount_args
}

/// Base image named by the Dockerfile's `ARG BASE_DOCKER` line, if any.
pub fn base_docker(dockerfile: &Path) -> Result<String> {
    let content = fs::read_to_string(dockerfile)?;
    for line in content.lines() {
        if line.contains("ARG BASE_DOCKER") {
            if let Some(value) = line.split('=').next_back() {
                return Ok(value.trim().to_string());
            }
        }
    }
    Ok(String::new())
}

pub fn base_docker_sha(console: &Console, base_docker: &str) -> Result<String> {
    console.sh(&format!(
        "docker inspect --format='{{{{.Id}}}}' {}",
        base_docker
    ))
}

pub fn host_name(console: &Console, log: &dyn LogSink) -> Result<String> {
    let host_name = console.sh("hostname")?;
    log.info(&format!("Host name: {}", host_name));
    Ok(host_name)
}
