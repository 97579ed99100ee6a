//! Resource handler tests against a recording mock session.

mod common;

use pretty_assertions::assert_eq;
use std::path::PathBuf;

use common::{MockConnection, Operation};
use deploymate::connection::{CommandResult, TransferError};
use deploymate::modules::*;

fn failure(code: i32, stderr: &str) -> CommandResult {
    CommandResult::failure(code, String::new(), stderr.to_string())
}

fn upload_dir(sources: &[&str], remote: &str) -> FileTask {
    FileTask::Upload(UploadSpec {
        sources: sources.iter().map(PathBuf::from).collect(),
        destination: UploadDestination::Directory(remote.to_string()),
    })
}

#[tokio::test]
async fn test_package_install_and_update() {
    let conn = MockConnection::new("ops@10.0.0.5:22");
    let handler = PackageHandler::new(BecomeMethod::Sudo);

    handler
        .execute(&PackageTask::Install { package: "nginx".into() }, &conn)
        .await
        .unwrap();
    handler
        .execute(&PackageTask::Update { package: "nginx".into() }, &conn)
        .await
        .unwrap();

    assert_eq!(
        conn.commands(),
        vec![
            "sudo apt-get install -y nginx".to_string(),
            "sudo apt-get update && sudo apt-get install --only-upgrade -y nginx".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_package_remove_purges_then_autoremoves() {
    let conn = MockConnection::new("ops@10.0.0.5:22");
    let task = PackageTask::Remove { package: "apache2".into() };

    PackageHandler::default().execute(&task, &conn).await.unwrap();

    assert_eq!(
        conn.commands(),
        vec![
            "sudo apt-get purge -y apache2".to_string(),
            "sudo apt-get autoremove -y".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_package_purge_failure_skips_autoremove() {
    let conn = MockConnection::new("ops@10.0.0.5:22");
    conn.set_command_result("sudo apt-get purge -y apache2", failure(100, "locked"));
    let task = PackageTask::Remove { package: "apache2".into() };

    let err = PackageHandler::default()
        .execute(&task, &conn)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ResourceType::Package);
    assert!(matches!(
        err.reason,
        HandlerFailure::CommandFailed { exit_code: 100, .. }
    ));
    assert!(!conn.was_command_executed("sudo apt-get autoremove -y"));
}

#[tokio::test]
async fn test_package_autoremove_failure_is_not_an_error() {
    let conn = MockConnection::new("ops@10.0.0.5:22");
    conn.set_command_result("sudo apt-get autoremove -y", failure(1, "held packages"));
    let task = PackageTask::Remove { package: "apache2".into() };

    let result = PackageHandler::default().execute(&task, &conn).await;

    assert!(result.is_ok());
    assert_eq!(conn.command_count(), 2);
}

#[tokio::test]
async fn test_non_fatal_exit_codes_do_not_raise() {
    let conn = MockConnection::new("ops@10.0.0.5:22");
    conn.set_default_result(failure(5, "Unit nginx.service not found."));

    let service = ServiceTask {
        action: ServiceAction::Start,
        service: "nginx".into(),
    };
    assert!(ServiceHandler::default().execute(&service, &conn).await.is_ok());
    assert!(UpdateHandler::default()
        .execute(&UpdateTask::Upgrade, &conn)
        .await
        .is_ok());
    let dir = DirectoryTask::Delete { path: "/srv/old".into() };
    assert!(DirectoryHandler::default().execute(&dir, &conn).await.is_ok());

    assert_eq!(
        conn.commands(),
        vec![
            "sudo systemctl start nginx".to_string(),
            "sudo apt-get upgrade -y".to_string(),
            "rm -r /srv/old".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_doas_wraps_privileged_commands() {
    let conn = MockConnection::new("ops@10.0.0.5:22");
    let handler = FileHandler::new(BecomeMethod::Doas, "files", None);

    handler
        .execute(&FileTask::Delete { path: "/etc/motd".into() }, &conn)
        .await
        .unwrap();

    assert_eq!(conn.commands(), vec!["doas rm -f /etc/motd".to_string()]);
}

#[tokio::test]
async fn test_file_overwrite_quotes_content() {
    let conn = MockConnection::new("ops@10.0.0.5:22");
    let task = FileTask::Overwrite {
        path: "/etc/app/app.env".into(),
        content: "MODE=prod; rm -rf /".into(),
    };

    FileHandler::default().execute(&task, &conn).await.unwrap();

    assert_eq!(
        conn.commands(),
        vec![
            "sudo mkdir -p /etc/app".to_string(),
            "printf '%s\\n' 'MODE=prod; rm -rf /' | sudo tee /etc/app/app.env > /dev/null"
                .to_string(),
        ]
    );
}

#[tokio::test]
async fn test_file_content_is_written_literally() {
    let conn = MockConnection::new("ops@10.0.0.5:22");
    let task = FileTask::Create {
        path: "/tmp/flags.txt".into(),
        content: "-n".into(),
    };

    FileHandler::default().execute(&task, &conn).await.unwrap();

    assert_eq!(
        conn.commands(),
        vec![
            "sudo mkdir -p /tmp".to_string(),
            "printf '%s\\n' -n | sudo tee /tmp/flags.txt > /dev/null".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_numeric_content_from_playbook_is_written() {
    let conn = MockConnection::new("ops@10.0.0.5:22");
    let params: serde_yaml::Mapping =
        serde_yaml::from_str("action: create\nfile_path: /etc/app/port\ncontent: 8080").unwrap();
    let task = FileTask::from_params(&params).unwrap();

    FileHandler::default().execute(&task, &conn).await.unwrap();

    assert!(conn.was_command_executed(
        "printf '%s\\n' 8080 | sudo tee /etc/app/port > /dev/null"
    ));
}

#[tokio::test]
async fn test_upload_stages_then_moves() {
    let files = tempfile::tempdir().unwrap();
    std::fs::write(files.path().join("a.conf"), "a=1").unwrap();
    std::fs::write(files.path().join("b.conf"), "b=2").unwrap();
    let conn = MockConnection::new("ops@10.0.0.5:22");
    let handler = FileHandler::new(BecomeMethod::Sudo, files.path(), None);

    handler
        .execute(&upload_dir(&["a.conf", "b.conf"], "/etc/app/"), &conn)
        .await
        .unwrap();

    assert_eq!(
        conn.operations(),
        vec![
            Operation::Execute("sudo mkdir -p /etc/app".into()),
            Operation::Upload {
                local: files.path().join("a.conf"),
                remote: PathBuf::from("/home/ops/a.conf"),
            },
            Operation::Execute("sudo mv /home/ops/a.conf /etc/app/a.conf".into()),
            Operation::Upload {
                local: files.path().join("b.conf"),
                remote: PathBuf::from("/home/ops/b.conf"),
            },
            Operation::Execute("sudo mv /home/ops/b.conf /etc/app/b.conf".into()),
        ]
    );
}

#[tokio::test]
async fn test_upload_single_file_as_root_with_configured_staging() {
    let files = tempfile::tempdir().unwrap();
    let local = files.path().join("nginx.conf");
    std::fs::write(&local, "worker_processes 1;").unwrap();

    let task = FileTask::Upload(UploadSpec {
        sources: vec![local.clone()],
        destination: UploadDestination::File("/etc/nginx/nginx.conf".into()),
    });

    let root = MockConnection::new("root@10.0.0.5:22").with_user("root");
    FileHandler::new(BecomeMethod::Sudo, "unused", None)
        .execute(&task, &root)
        .await
        .unwrap();
    assert_eq!(
        root.uploads(),
        vec![(local.clone(), PathBuf::from("/root/nginx.conf"))]
    );
    assert!(root.was_command_executed("sudo mv /root/nginx.conf /etc/nginx/nginx.conf"));

    let ops = MockConnection::new("ops@10.0.0.5:22");
    FileHandler::new(BecomeMethod::Sudo, "unused", Some("/var/tmp/".into()))
        .execute(&task, &ops)
        .await
        .unwrap();
    assert_eq!(
        ops.uploads(),
        vec![(local, PathBuf::from("/var/tmp/nginx.conf"))]
    );
}

#[tokio::test]
async fn test_upload_move_failure_raises_and_cleans_up() {
    let files = tempfile::tempdir().unwrap();
    std::fs::write(files.path().join("a.conf"), "a=1").unwrap();
    let conn = MockConnection::new("ops@10.0.0.5:22");
    conn.set_command_result(
        "sudo mv /home/ops/a.conf /etc/app/a.conf",
        failure(1, "sudo: a password is required"),
    );
    let handler = FileHandler::new(BecomeMethod::Sudo, files.path(), None);

    let err = handler
        .execute(&upload_dir(&["a.conf"], "/etc/app"), &conn)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ResourceType::File);
    assert!(matches!(err.reason, HandlerFailure::CommandFailed { exit_code: 1, .. }));
    // the transfer itself went through
    assert_eq!(conn.uploads().len(), 1);
    assert_eq!(
        conn.commands().last().map(String::as_str),
        Some("rm -f /home/ops/a.conf")
    );
}

#[tokio::test]
async fn test_upload_missing_local_file() {
    let files = tempfile::tempdir().unwrap();
    let conn = MockConnection::new("ops@10.0.0.5:22");
    let handler = FileHandler::new(BecomeMethod::Sudo, files.path(), None);

    let err = handler
        .execute(&upload_dir(&["missing.conf"], "/etc/app"), &conn)
        .await
        .unwrap_err();

    assert!(matches!(
        err.reason,
        HandlerFailure::Transfer(TransferError::LocalFileMissing(ref p))
            if *p == files.path().join("missing.conf")
    ));
    assert!(conn.uploads().is_empty());
    assert_eq!(conn.commands(), vec!["sudo mkdir -p /etc/app".to_string()]);
}

#[tokio::test]
async fn test_upload_transport_failure_names_remote_path() {
    let files = tempfile::tempdir().unwrap();
    std::fs::write(files.path().join("a.conf"), "a=1").unwrap();
    let conn = MockConnection::new("ops@10.0.0.5:22");
    conn.set_upload_fails(true);
    let handler = FileHandler::new(BecomeMethod::Sudo, files.path(), None);

    let err = handler
        .execute(&upload_dir(&["a.conf"], "/etc/app"), &conn)
        .await
        .unwrap_err();

    assert!(matches!(
        err.reason,
        HandlerFailure::Transfer(TransferError::Failed { ref remote_path, .. })
            if remote_path == "/home/ops/a.conf"
    ));
    assert!(!conn.commands().iter().any(|c| c.contains(" mv ")));
}

#[tokio::test]
async fn test_command_runs_verbatim_and_tolerates_failure() {
    let conn = MockConnection::new("ops@10.0.0.5:22");
    conn.set_default_result(failure(2, "grep: no match"));
    let task = CommandTask::new("echo \"Hello, DeployMate!\" | grep -c World");

    assert!(CommandHandler.execute(&task, &conn).await.is_ok());
    assert_eq!(
        conn.commands(),
        vec!["echo \"Hello, DeployMate!\" | grep -c World".to_string()]
    );
}

#[tokio::test]
async fn test_command_without_command_is_a_no_op() {
    let conn = MockConnection::new("ops@10.0.0.5:22");
    let task = CommandTask { command: None };

    assert!(CommandHandler.execute(&task, &conn).await.is_ok());
    assert_eq!(conn.command_count(), 0);
}

#[tokio::test]
async fn test_transport_failure_is_wrapped_in_handler_error() {
    let conn = MockConnection::new("ops@10.0.0.5:22");
    conn.set_should_fail(true);

    let err = UpdateHandler::default()
        .execute(&UpdateTask::Update, &conn)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ResourceType::Update);
    assert!(matches!(err.reason, HandlerFailure::Connection(_)));
    assert!(err.to_string().starts_with("update handler: "));
}

#[tokio::test]
async fn test_registry_handler_for_tag_applies_task() {
    let conn = MockConnection::new("ops@10.0.0.5:22");
    let registry = HandlerRegistry::new(HandlerSettings {
        become_method: BecomeMethod::Doas,
        ..Default::default()
    });

    let handler = registry.create_for_tag("directory").unwrap();
    handler
        .apply(
            &Resource::Directory(DirectoryTask::Create { path: "/srv/app".into() }),
            &conn,
        )
        .await
        .unwrap();

    assert_eq!(conn.commands(), vec!["doas mkdir -p /srv/app".to_string()]);
}
