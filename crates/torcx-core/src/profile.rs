use crate::merge::fold_profiles;
use crate::ProfileError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::Builder;
use torcx_schema::{
    load_profile, save_profile, ApplyConfig, CommonConfig, Images, ProfileManifestV0,
};
use tracing::{debug, info, warn};

/// Extension of profile manifest files.
pub const PROFILE_EXTENSION: &str = "json";
/// Permission bits of the resolved run profile.
pub const RUN_PROFILE_MODE: u32 = 0o644;

/// Directory layout for profiles and run state on a host.
///
/// All roots are explicit. Paths are derived, never created, by this type.
#[derive(Debug, Clone)]
pub struct ProfileLayout {
    run_dir: PathBuf,
    conf_dir: PathBuf,
    vendor_dirs: Vec<PathBuf>,
}

impl ProfileLayout {
    /// `vendor_dirs` are read-only roots (e.g. the OS and OEM partitions),
    /// listed from highest to lowest lookup priority.
    pub fn new(
        run_dir: impl Into<PathBuf>,
        conf_dir: impl Into<PathBuf>,
        vendor_dirs: Vec<PathBuf>,
    ) -> Self {
        Self {
            run_dir: run_dir.into(),
            conf_dir: conf_dir.into(),
            vendor_dirs,
        }
    }

    /// Build a layout from a common config. Returns `None` unless both the
    /// run and conf directories are set.
    pub fn from_config(common: &CommonConfig, vendor_dirs: Vec<PathBuf>) -> Option<Self> {
        let run_dir = common.run_dir.clone()?;
        let conf_dir = common.conf_dir.clone()?;
        Some(Self::new(run_dir, conf_dir, vendor_dirs))
    }

    #[inline]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    #[inline]
    pub fn conf_dir(&self) -> &Path {
        &self.conf_dir
    }

    #[inline]
    pub fn user_profile_dir(&self) -> PathBuf {
        self.conf_dir.join("profiles")
    }

    pub fn vendor_profile_dirs(&self) -> Vec<PathBuf> {
        self.vendor_dirs.iter().map(|d| d.join("profiles")).collect()
    }

    /// Search order for named profiles: user profiles first, then vendor.
    pub fn profile_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.user_profile_dir()];
        dirs.extend(self.vendor_profile_dirs());
        dirs
    }

    /// File holding the name of the profile to use on next boot.
    #[inline]
    pub fn next_profile_file(&self) -> PathBuf {
        self.conf_dir.join("next-profile")
    }

    #[inline]
    pub fn run_profile_path(&self) -> PathBuf {
        self.run_dir.join("profile.json")
    }

    #[inline]
    pub fn run_bindir(&self) -> PathBuf {
        self.run_dir.join("bin")
    }

    #[inline]
    pub fn run_unpackdir(&self) -> PathBuf {
        self.run_dir.join("unpack")
    }
}

/// Check that `name` is a bare profile name that stays inside its directory.
pub fn validate_profile_name(name: &str) -> Result<(), ProfileError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(ProfileError::InvalidName(name.to_owned()));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(ProfileError::InvalidName(name.to_owned()));
    }
    Ok(())
}

/// Path of the profile named `name` inside `dir`.
///
/// `name` is joined as is; see [`validate_profile_name`] for untrusted input.
pub fn profile_file(dir: impl AsRef<Path>, name: &str) -> PathBuf {
    dir.as_ref().join(format!("{name}.{PROFILE_EXTENSION}"))
}

/// List profiles available in `dirs`, keyed by name.
///
/// Missing or unreadable directories are skipped. When a name exists in
/// several directories the earliest directory wins.
pub fn list_profiles(dirs: &[PathBuf]) -> Result<BTreeMap<String, PathBuf>, ProfileError> {
    let mut found = BTreeMap::new();
    for dir in dirs {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("profile directory {} does not exist", dir.display());
                continue;
            }
            Err(e) => {
                warn!("skipping profile directory {}: {e}", dir.display());
                continue;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("unreadable entry in {}: {e}", dir.display());
                    continue;
                }
            };
            let path = entry.path();
            let is_profile = path.extension().and_then(|e| e.to_str()) == Some(PROFILE_EXTENSION);
            if !is_profile || !path.is_file() {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned) else {
                continue;
            };
            found.entry(name).or_insert(path);
        }
    }
    Ok(found)
}

/// Locate the profile named `name` in the first directory that has it.
pub fn find_profile(dirs: &[PathBuf], name: &str) -> Result<PathBuf, ProfileError> {
    validate_profile_name(name)?;
    dirs.iter()
        .map(|dir| profile_file(dir, name))
        .find(|path| path.is_file())
        .ok_or_else(|| ProfileError::NotFound(name.to_owned()))
}

/// Read the profile name stored in a selector file such as `next-profile`.
///
/// A missing file or blank content means no profile is selected.
pub fn read_next_profile(path: impl AsRef<Path>) -> Result<Option<String>, ProfileError> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(content) => {
            let name = content.trim();
            Ok((!name.is_empty()).then(|| name.to_owned()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ProfileError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Load and fold the lower profiles of `cfg`, then merge the upper profile
/// on top.
pub fn resolve(cfg: &ApplyConfig) -> Result<Images, ProfileError> {
    let mut lowers = Vec::with_capacity(cfg.lower_profiles.len());
    for path in &cfg.lower_profiles {
        let manifest = load_profile(path)?;
        debug!("lower profile {}: {} images", path.display(), manifest.value.len());
        lowers.push(manifest.value);
    }

    let upper = match &cfg.upper_profile {
        Some(path) => {
            let manifest = load_profile(path)?;
            debug!("upper profile {}: {} images", path.display(), manifest.value.len());
            Some(manifest.value)
        }
        None => None,
    };

    Ok(fold_profiles(&lowers, upper.as_ref()))
}

/// Persist `images` as the run profile at `path`.
///
/// The manifest is written to a temporary file next to `path` and renamed
/// over it, so readers never see a partial profile.
pub fn write_run_profile(path: impl AsRef<Path>, images: &Images) -> Result<(), ProfileError> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or(Path::new("."));
    let tmp = Builder::new()
        .prefix(".profile")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|source| ProfileError::Io {
            path: dir.to_path_buf(),
            source,
        })?
        .into_temp_path();

    let manifest = ProfileManifestV0::new(images.clone());
    save_profile(&tmp, RUN_PROFILE_MODE, &manifest)?;
    tmp.persist(path).map_err(|e| ProfileError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    // Fsync parent directory to make the rename durable.
    if let Ok(f) = fs::File::open(dir) {
        let _ = f.sync_all();
    }
    info!("wrote run profile {} ({} images)", path.display(), images.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use torcx_schema::Image;

    fn write_profile(dir: &Path, name: &str, images: &[(&str, &str)]) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = profile_file(dir, name);
        let images: Images = images.iter().map(|(n, r)| Image::new(*n, *r)).collect();
        save_profile(&path, 0o644, &ProfileManifestV0::new(images)).unwrap();
        path
    }

    #[test]
    fn layout_paths_are_correct() {
        let layout = ProfileLayout::new(
            "/run/torcx",
            "/etc/torcx",
            vec![PathBuf::from("/usr/share/torcx"), PathBuf::from("/usr/share/oem/torcx")],
        );
        assert_eq!(layout.user_profile_dir(), PathBuf::from("/etc/torcx/profiles"));
        assert_eq!(
            layout.profile_dirs(),
            vec![
                PathBuf::from("/etc/torcx/profiles"),
                PathBuf::from("/usr/share/torcx/profiles"),
                PathBuf::from("/usr/share/oem/torcx/profiles"),
            ]
        );
        assert_eq!(layout.next_profile_file(), PathBuf::from("/etc/torcx/next-profile"));
        assert_eq!(layout.run_profile_path(), PathBuf::from("/run/torcx/profile.json"));
        assert_eq!(layout.run_bindir(), PathBuf::from("/run/torcx/bin"));
        assert_eq!(layout.run_unpackdir(), PathBuf::from("/run/torcx/unpack"));
    }

    #[test]
    fn layout_from_config_requires_dirs() {
        let mut common = CommonConfig {
            run_dir: Some("/run/torcx".into()),
            ..CommonConfig::default()
        };
        assert!(ProfileLayout::from_config(&common, Vec::new()).is_none());
        common.conf_dir = Some("/etc/torcx".into());
        let layout = ProfileLayout::from_config(&common, Vec::new()).unwrap();
        assert_eq!(layout.conf_dir(), Path::new("/etc/torcx"));
        assert_eq!(layout.run_dir(), Path::new("/run/torcx"));
    }

    #[test]
    fn list_profiles_prefers_earlier_dirs() {
        let root = tempfile::tempdir().unwrap();
        let user = root.path().join("user");
        let vendor = root.path().join("vendor");
        let user_docker = write_profile(&user, "docker", &[("docker", "17.09")]);
        write_profile(&vendor, "docker", &[("docker", "1.12")]);
        write_profile(&vendor, "vendor", &[]);
        fs::write(vendor.join("README"), "not a profile").unwrap();

        let found = list_profiles(&[user, vendor.clone(), root.path().join("missing")]).unwrap();
        let names: Vec<_> = found.keys().cloned().collect();
        assert_eq!(names, vec!["docker", "vendor"]);
        assert_eq!(found["docker"], user_docker);
        assert_eq!(found["vendor"], vendor.join("vendor.json"));
    }

    #[test]
    fn find_profile_searches_in_order() {
        let root = tempfile::tempdir().unwrap();
        let user = root.path().join("user");
        let vendor = root.path().join("vendor");
        let expected = write_profile(&vendor, "vendor", &[]);
        fs::create_dir_all(&user).unwrap();

        assert_eq!(find_profile(&[user.clone(), vendor], "vendor").unwrap(), expected);
        assert!(matches!(
            find_profile(&[user], "vendor"),
            Err(ProfileError::NotFound(name)) if name == "vendor"
        ));
    }

    #[test]
    fn list_profiles_skips_unreadable_dirs() {
        let root = tempfile::tempdir().unwrap();
        let not_a_dir = root.path().join("vendor");
        fs::write(&not_a_dir, "regular file").unwrap();
        let user = root.path().join("user");
        let expected = write_profile(&user, "docker", &[("docker", "17.09")]);

        let found = list_profiles(&[not_a_dir, user]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["docker"], expected);
    }

    #[test]
    fn find_profile_rejects_path_names() {
        let root = tempfile::tempdir().unwrap();
        let profiles = root.path().join("profiles");
        write_profile(root.path(), "outside", &[]);
        fs::create_dir_all(&profiles).unwrap();

        for name in ["../outside", "sub/outside", "..", ".", "", "a\\b"] {
            assert!(
                matches!(
                    find_profile(&[profiles.clone()], name),
                    Err(ProfileError::InvalidName(n)) if n == name
                ),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn validate_profile_name_accepts_plain_names() {
        for name in ["vendor", "docker-devel", "oem.v2", "..hidden"] {
            assert!(validate_profile_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn next_profile_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("next-profile");
        assert_eq!(read_next_profile(&path).unwrap(), None);

        fs::write(&path, "docker-devel\n").unwrap();
        assert_eq!(read_next_profile(&path).unwrap().as_deref(), Some("docker-devel"));

        fs::write(&path, "  \n").unwrap();
        assert_eq!(read_next_profile(&path).unwrap(), None);
    }

    #[test]
    fn resolve_folds_lowers_then_upper() {
        let dir = tempfile::tempdir().unwrap();
        let vendor = write_profile(dir.path(), "vendor", &[("docker", "1.12"), ("rkt", "1.25")]);
        let oem = write_profile(dir.path(), "oem", &[("docker", "17.03")]);
        let user = write_profile(dir.path(), "user", &[("rkt", ""), ("etcd", "3.2")]);

        let cfg = ApplyConfig {
            lower_profiles: vec![vendor, oem],
            upper_profile: Some(user),
            ..ApplyConfig::default()
        };
        let merged = resolve(&cfg).unwrap();
        let pairs: Vec<_> = merged
            .iter()
            .map(|i| (i.name.as_str(), i.reference.as_str()))
            .collect();
        assert_eq!(pairs, vec![("docker", "17.03"), ("etcd", "3.2")]);
    }

    #[test]
    fn resolve_without_upper_uses_lowers_only() {
        let dir = tempfile::tempdir().unwrap();
        let vendor = write_profile(dir.path(), "vendor", &[("docker", "1.12")]);
        let cfg = ApplyConfig {
            lower_profiles: vec![vendor],
            ..ApplyConfig::default()
        };
        assert_eq!(resolve(&cfg).unwrap().len(), 1);
    }

    #[test]
    fn resolve_fails_on_missing_lower() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ApplyConfig {
            lower_profiles: vec![dir.path().join("absent.json")],
            ..ApplyConfig::default()
        };
        match resolve(&cfg) {
            Err(ProfileError::Manifest(e)) => {
                assert_eq!(e.kind(), torcx_schema::ErrorKind::Io);
            }
            other => panic!("expected manifest I/O error, got {other:?}"),
        }
    }

    #[test]
    fn write_run_profile_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        fs::write(&path, "stale").unwrap();

        let images = Images::new(vec![Image::new("docker", "17.09")]);
        write_run_profile(&path, &images).unwrap();

        assert_eq!(load_profile(&path).unwrap().value, images);
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name() != "profile.json")
            .collect();
        assert!(leftovers.is_empty(), "temporary files left behind");
    }

    #[cfg(unix)]
    #[test]
    fn write_run_profile_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        write_run_profile(&path, &Images::default()).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, RUN_PROFILE_MODE);
    }
}
