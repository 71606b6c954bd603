use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use benchmark_models::environment::{
    base_docker, cpu_docker_args, env_docker_args, gpu_docker_args_for, gpu_index_range,
    mount_docker_args, parse_drm_render_minor, parse_nvidia_gpu_arch, GpuVendor, HostOs,
    MountPoint,
};
use benchmark_models::error::BenchmarkError;
use benchmark_models::logger::MemoryLog;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join("benchmark-models-tests")
        .join(format!("environment-{}-{}", name, std::process::id()));
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn vendor_tokens_and_suffixes() {
    assert_eq!(GpuVendor::Nvidia.as_str(), "NVIDIA");
    assert_eq!(GpuVendor::Amd.as_str(), "AMD");
    assert_eq!(GpuVendor::Nvidia.dockerfile_suffix(), ".nvidia");
    assert_eq!(GpuVendor::Amd.dockerfile_suffix(), ".amd");
}

#[test]
fn host_os_tokens_and_suffixes() {
    assert_eq!(HostOs::Ubuntu.as_str(), "HOST_UBUNTU");
    assert_eq!(HostOs::Centos.as_str(), "HOST_CENTOS");
    assert_eq!(HostOs::Sles.as_str(), "HOST_SLES");
    assert_eq!(HostOs::Ubuntu.dockerfile_suffix(), ".ubuntu");
    assert_eq!(HostOs::Centos.dockerfile_suffix(), ".centos");
    assert_eq!(HostOs::Sles.dockerfile_suffix(), ".sles");
}

#[test]
fn gpu_docker_args_per_vendor() {
    assert_eq!(
        gpu_docker_args_for(GpuVendor::Nvidia),
        "--gpus all --shm-size 16g"
    );
    assert_eq!(
        gpu_docker_args_for(GpuVendor::Amd),
        "--device=/dev/kfd --device=/dev/dri --shm-size 16g"
    );
}

#[test]
fn cpu_docker_args_honors_the_requested_range() {
    let log = MemoryLog::new();
    assert_eq!(
        cpu_docker_args(Some("0-3,10-15"), &log),
        "--cpuset-cpus=\"0-3,10-15\""
    );
    // Without a request the range covers every CPU on the host.
    assert!(cpu_docker_args(None, &log).starts_with("--cpuset-cpus=\"0-"));
}

#[test]
fn env_docker_args_lists_each_variable() {
    let log = MemoryLog::new();
    let mut envs = BTreeMap::new();
    envs.insert("A".to_string(), "1".to_string());
    envs.insert("B".to_string(), "2".to_string());
    assert_eq!(env_docker_args(Some(&envs), &log), "--env A=1 --env B=2 ");
    assert_eq!(env_docker_args(None, &log), "");
}

#[test]
fn mount_docker_args_applies_the_per_mount_mode() {
    let log = MemoryLog::new();
    let mounts = [
        MountPoint {
            host_path: "/data".to_string(),
            container_path: "/data".to_string(),
            read_write: true,
        },
        MountPoint {
            host_path: "/ref".to_string(),
            container_path: "/models".to_string(),
            read_write: false,
        },
    ];
    assert_eq!(
        mount_docker_args(Some(&mounts), &log),
        "-v /data:/data:rw -v /ref:/models:ro "
    );
    assert_eq!(mount_docker_args(None, &log), "");
}

#[test]
fn nvidia_arch_is_extracted_from_the_product_name() {
    assert_eq!(
        parse_nvidia_gpu_arch("NVIDIA A100-SXM4-40GB").unwrap(),
        "A100"
    );
    assert_eq!(
        parse_nvidia_gpu_arch("Tesla V100-SXM2-16GB").unwrap(),
        "V100"
    );
    assert_eq!(parse_nvidia_gpu_arch("NVIDIA H100 PCIe").unwrap(), "H100");

    let err = parse_nvidia_gpu_arch("GeForce RTX 4090").unwrap_err();
    assert!(matches!(err, BenchmarkError::Probe(_)));
}

#[test]
fn render_minor_is_parsed_from_topology_properties() {
    let properties = "\
cpu_cores_count 0
simd_count 256
drm_render_minor 128
hive_id 0
";
    assert_eq!(parse_drm_render_minor(properties), Some(128));
    assert_eq!(parse_drm_render_minor("drm_render_minor 0"), Some(0));
    assert_eq!(parse_drm_render_minor("cpu_cores_count 64"), None);
}

#[test]
fn gpu_index_range_covers_all_devices() {
    assert_eq!(gpu_index_range(1), "0-0");
    assert_eq!(gpu_index_range(8), "0-7");
}

#[test]
fn base_docker_reads_the_build_arg() {
    let dir = scratch_dir("base-docker");

    let dockerfile = dir.join("Dockerfile.amd");
    fs::write(
        &dockerfile,
        "ARG BASE_DOCKER=rocm/pytorch:latest\nFROM $BASE_DOCKER\nRUN true\n",
    )
    .unwrap();
    assert_eq!(base_docker(&dockerfile).unwrap(), "rocm/pytorch:latest");

    let plain = dir.join("Dockerfile");
    fs::write(&plain, "FROM ubuntu:22.04\n").unwrap();
    assert_eq!(base_docker(&plain).unwrap(), "");
}
