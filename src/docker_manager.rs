use crate::console::{Console, RunOpts};
use crate::error::{BenchmarkError, Result};

use std::collections::BTreeMap;

/// One running container: created on construction, executed into through
/// [`DockerManager::sh`], stopped and removed on drop.
pub struct DockerManager {
    console: Console,
    docker_sha: String,
    keep_alive: bool,
}

impl DockerManager {
    /// Container path the host working directory is mounted at.
    pub const WORKSPACE_DIR: &'static str = "/myworkspace/";

    /// Start a container from `image` under `container_name`.
    ///
    /// The container runs as the current uid:gid, with every entry of
    /// `mounts` bound host-path to host-path and the working directory
    /// mounted read-write at [`Self::WORKSPACE_DIR`].
    pub fn new(
        image: &str,
        container_name: &str,
        docker_opts: &str,
        mounts: Option<&[String]>,
        env_vars: Option<&BTreeMap<String, String>>,
        keep_alive: bool,
        console: Console,
    ) -> Result<DockerManager> {
        let userid = console.sh("id -u")?;
        let groupid = console.sh("id -g")?;

        // The existence check and the run below are separate docker calls;
        // a container named in between still collides.
        let existing = console.sh(&format!(
            "docker container ps -a | grep {} | wc -l",
            container_name
        ))?;
        if existing != "0" {
            console.log().error(&format!(
                "Container with name {} already exists. Stop (docker stop --time=1 SHA) and remove it (docker rm -f SHA) to proceed",
                container_name
            ));
            return Err(BenchmarkError::ContainerExists(container_name.to_string()));
        }

        let cwd = std::env::current_dir()?;
        let mut command = format!(
            "docker run -t -d -u {}:{} {} ",
            userid, groupid, docker_opts
        );
        if let Some(mounts) = mounts {
            for mount in mounts {
                command.push_str(&format!("-v {}:{} ", mount, mount));
            }
        }
        command.push_str(&format!("-v {}:{} ", cwd.display(), Self::WORKSPACE_DIR));
        if let Some(env_vars) = env_vars {
            for (key, value) in env_vars {
                command.push_str(&format!("-e {}={} ", key, value));
            }
        }
        command.push_str(&format!("--workdir {} ", Self::WORKSPACE_DIR));
        command.push_str(&format!("--name {} ", container_name));
        command.push_str(image);
        // A long-lived no-op keeps the container up between execs.
        command.push_str(" cat");

        console.sh(&command)?;

        let docker_sha = console.sh(&format!("docker ps -aqf 'name={}'", container_name))?;

        Ok(DockerManager {
            console,
            docker_sha,
            keep_alive,
        })
    }

    pub fn sha(&self) -> &str {
        &self.docker_sha
    }

    /// Run a shell command inside the container, as root.
    pub fn sh(&self, command: &str, opts: &RunOpts) -> Result<String> {
        self.console.sh_opts(
            &format!("docker exec {} bash -c \"{}\"", self.docker_sha, command),
            opts,
        )
    }
}

impl Drop for DockerManager {
    fn drop(&mut self) {
        let log = self.console.log();
        if !self.keep_alive {
            log.info("Stopping and removing the Docker container");
            if let Err(err) = self
                .console
                .sh(&format!("docker stop --time=1 {}", self.docker_sha))
            {
                log.error(&format!("Failed to stop container: {}", err));
            }
            if let Err(err) = self
                .console
                .sh(&format!("docker rm -f {}", self.docker_sha))
            {
                log.error(&format!("Failed to remove container: {}", err));
            }
            return;
        }

        log.info("==========================================");
        log.info(&format!("Keeping docker alive, sha : {}", self.docker_sha));
        log.info(&format!(
            "Open a bash session in container : docker exec -it {} bash",
            self.docker_sha
        ));
        log.info(&format!(
            "Stop container : docker stop --time=1 {}",
            self.docker_sha
        ));
        log.info(&format!(
            "Remove container : docker rm -f {}",
            self.docker_sha
        ));
        log.info("==========================================");
    }
}
