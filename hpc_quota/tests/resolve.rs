use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

use hpc_quota::exec::{CommandLine, Executor};
use hpc_quota::resolve::{LocalDirs, Resolver};
use hpc_quota::{backend, ClusterConfig, Count, CurrentIdentity, Error, FileSystem, Subject};

// replays recorded tool output.
struct Replay {
    outputs: HashMap<String, String>,
    seen:    Mutex<Vec<String>>,
}

impl Replay {
    fn new(pairs: &[(&str, &str)]) -> Arc<Replay> {
        Arc::new(Replay {
            outputs: pairs.iter().map(|(c, o)| (c.to_string(), o.to_string())).collect(),
            seen:    Mutex::new(Vec::new()),
        })
    }
}

impl Executor for Replay {
    fn execute(&self, cmd: &CommandLine) -> hpc_quota::Result<String> {
        let line = cmd.to_string();
        self.seen.lock().unwrap().push(line.clone());
        self.outputs.get(&line).cloned().ok_or_else(|| Error::Execution {
            command: line,
            message: "not recorded".to_string(),
        })
    }
}

fn cluster(root: &str, fs: FileSystem, path_based: bool) -> ClusterConfig {
    let mut c = ClusterConfig::new(
        fs,
        "/cluster",
        format!("{}/home", root),
        format!("{}/work/users", root),
    );
    c.project_path_prefixes = vec![format!("{}/projects", root), format!("{}/shared", root)];
    c.path_based = path_based;
    c
}

#[test]
fn lustre_path_based_account() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().to_str().unwrap().to_string();
    fs::create_dir_all(format!("{}/projects/nn1234k", root)).unwrap();
    fs::create_dir_all(format!("{}/shared/nn5678k", root)).unwrap();
    // a plain file is not a project directory.
    fs::create_dir_all(format!("{}/projects", root)).unwrap();
    fs::write(format!("{}/projects/nn0000k", root), b"").unwrap();

    let home = format!("{}/home/alice", root);
    let p1 = format!("{}/projects/nn1234k", root);
    let p2 = format!("{}/shared/nn5678k", root);
    let (c_home, c_p1, c_p2) = (
        format!("lfs project -d {}", home),
        format!("lfs project -d {}", p1),
        format!("lfs project -d {}", p2),
    );
    let exec = Replay::new(&[
        (c_home.as_str(), "    0 - home"),
        (c_p1.as_str(), " 1234 P nn1234k"),
        (c_p2.as_str(), " 5678 P nn5678k"),
        ("lfs quota -q -p 1234 /cluster", "/cluster 360448* 1048576 2097152 6d 1 100000 110000 -"),
        ("lfs quota -q -p 5678 /cluster", "/cluster 0 0 0 - 0 0 0 -"),
    ]);

    let config = cluster(&root, FileSystem::Lustre, true);
    let backend = backend::select(config.file_system, exec.clone(), || unreachable!()).unwrap();
    let groups = |_: &str| -> hpc_quota::Result<Vec<String>> {
        Ok(vec!["alice".into(), "nn0000k".into(), "nn1234k".into(), "nn5678k".into()])
    };
    let resolver = Resolver::new(&config, backend.as_ref(), &groups, &LocalDirs);
    let map = resolver.resolve(&Subject::Account("alice".into())).unwrap();

    let keys: Vec<&String> = map.keys().collect();
    assert_eq!(keys, vec![&home, &p1, &p2]);

    assert_eq!(map[&home].space_used_bytes, Count::Unknown);
    assert_eq!(map[&home].inodes_used, Count::Unknown);

    let u = &map[&p1];
    assert_eq!(u.space_used_bytes, Count::Known(360448 * 1024));
    assert_eq!(u.space_soft_limit_bytes, Some(1024 * 1024 * 1024));
    assert_eq!(u.inodes_hard_limit, Some(110000));

    let u = &map[&p2];
    assert_eq!(u.space_soft_limit_bytes, None);
    assert_eq!(u.inodes_hard_limit, None);

    assert!(!exec.seen.lock().unwrap().iter().any(|c| c.contains("-p 0")));
}

#[test]
fn beegfs_legacy_identity_account() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().to_str().unwrap().to_string();
    fs::create_dir_all(format!("{}/shared/nn1234k", root)).unwrap();

    let header = "name,id,size,hard,files,hard";
    let user = format!("{}\nalice,1001,369164288,21474836480,90000,100000", header);
    let home = format!("{}\nalice_g,2001,100,0,10,0", header);
    let scratch = format!("{}\nalice,1001,200,unlimited,20,unlimited", header);
    let project = format!("{}\nnn1234k,3001,300,1000,30,100", header);
    let exec = Replay::new(&[
        ("beegfs-ctl --getquota --uid alice --csv", user.as_str()),
        ("beegfs-ctl --getquota --gid alice_g --csv", home.as_str()),
        ("beegfs-ctl --getquota --gid alice --csv", scratch.as_str()),
        ("beegfs-ctl --getquota --gid nn1234k --csv", project.as_str()),
    ]);

    let config = cluster(&root, FileSystem::BeegfsLegacy, false);
    let backend = backend::select(config.file_system, exec, || unreachable!()).unwrap();
    let groups = |_: &str| -> hpc_quota::Result<Vec<String>> {
        Ok(vec!["alice".into(), "alice_g".into(), "nn1234k".into(), "nn9999k".into()])
    };
    let resolver = Resolver::new(&config, backend.as_ref(), &groups, &LocalDirs);
    let map = resolver.resolve(&Subject::Account("alice".into())).unwrap();

    let keys: Vec<&str> = map.keys().map(|k| k.as_str()).collect();
    let expected = vec![
        "/cluster".to_string(),
        format!("{}/home/alice", root),
        format!("{}/work/users/alice", root),
        format!("{}/shared/nn1234k", root),
    ];
    assert_eq!(keys, expected);

    let u = &map["/cluster"];
    assert_eq!(u.space_used_bytes, Count::Known(369164288));
    assert_eq!(u.space_soft_limit_bytes, Some(21474836480));
    assert_eq!(u.space_hard_limit_bytes, Some(21474836480));
    assert_eq!(u.inodes_used, Count::Known(90000));
    assert_eq!(u.inodes_soft_limit, Some(100000));
    assert_eq!(u.inodes_hard_limit, Some(100000));

    let u = &map[&format!("{}/home/alice", root)];
    assert_eq!(u.space_soft_limit_bytes, None);
    assert_eq!(u.inodes_soft_limit, None);
}

#[test]
fn beegfs_modern_project() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().to_str().unwrap().to_string();
    fs::create_dir_all(format!("{}/projects/nn1234k", root)).unwrap();

    let exec = Replay::new(&[(
        "beegfs quota list-usage --output ndjson --gids current",
        "INFO: listing quota\n{\"name\":\"nn1234k\",\"type\":\"group\",\"space\":\"1GiB/2GiB\",\"inode\":\"1k/∞\"}",
    )]);
    let config = cluster(&root, FileSystem::BeegfsModern, false);
    let backend = backend::select(config.file_system, exec, || {
        Ok(CurrentIdentity {
            user:   "alice".into(),
            groups: vec!["nn1234k".into()],
        })
    })
    .unwrap();
    let groups = |_: &str| -> hpc_quota::Result<Vec<String>> { Ok(Vec::new()) };
    let resolver = Resolver::new(&config, backend.as_ref(), &groups, &LocalDirs);

    let map = resolver.resolve(&Subject::Project("nn1234k".into())).unwrap();
    assert_eq!(map.len(), 1);
    let u = &map[&format!("{}/projects/nn1234k", root)];
    assert_eq!(u.space_used_bytes, Count::Known(1u64 << 30));
    assert_eq!(u.space_hard_limit_bytes, Some(2u64 << 30));
    assert_eq!(u.inodes_used, Count::Known(1000));
    assert_eq!(u.inodes_hard_limit, None);

    match resolver.resolve(&Subject::Path(root.clone())) {
        Err(Error::UnsupportedFilesystem(_)) => {},
        other => panic!("unexpected {:?}", other),
    }
}
