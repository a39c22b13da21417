//! Test harness: throwaway git repositories and a scripted host UI.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use pkgflow::git::Repository;
use pkgflow::ui::{Capabilities, HostUi, LogStyle, PreviewStep, ToastLevel};

/// An isolated git repository in a temp directory, with an optional bare
/// `origin` next to it.
pub struct TestRepo {
    dir: tempfile::TempDir,
    pub repo: Repository,
    origin_path: Option<PathBuf>,
}

impl TestRepo {
    /// Fresh repository on `main` with one initial commit.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let work = dir.path().join("work");
        std::fs::create_dir_all(&work).unwrap();

        let repo = Repository::at(&work);
        repo.run_checked(&["init", "-q", "-b", "main"]).unwrap();
        configure_identity(&repo);

        let this = Self {
            dir,
            repo,
            origin_path: None,
        };
        this.write("README.md", "# test repo\n");
        this.commit_all("initial commit");
        this
    }

    /// As [`TestRepo::new`], plus a bare origin the initial commit is
    /// pushed to (`main` tracking).
    pub fn with_origin() -> Self {
        let mut this = Self::new();
        let origin = this.dir.path().join("origin.git");
        run_git_in(this.dir.path(), &["init", "-q", "--bare", "-b", "main", "origin.git"]);

        this.repo
            .run_checked(&["remote", "add", "origin", origin.to_str().unwrap()])
            .unwrap();
        this.repo
            .run_checked(&["push", "-q", "-u", "origin", "main"])
            .unwrap();
        this.origin_path = Some(origin);
        this
    }

    pub fn path(&self) -> &Path {
        self.repo.path()
    }

    pub fn origin_path(&self) -> &Path {
        self.origin_path.as_deref().expect("repo has no origin")
    }

    /// Repository handle on the bare origin, for asserting pushed state.
    pub fn origin(&self) -> Repository {
        Repository::at(self.origin_path())
    }

    /// A second working clone of the origin (for simulating other
    /// developers).
    pub fn clone_origin(&self, name: &str) -> Repository {
        let dest = self.dir.path().join(name);
        run_git_in(
            self.dir.path(),
            &[
                "clone",
                "-q",
                self.origin_path().to_str().unwrap(),
                dest.to_str().unwrap(),
            ],
        );
        let repo = Repository::at(&dest);
        configure_identity(&repo);
        repo
    }

    pub fn git(&self, args: &[&str]) -> String {
        self.repo.run_checked(args).unwrap()
    }

    pub fn write(&self, name: &str, content: &str) {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.path().join(name)).unwrap()
    }

    pub fn commit_all(&self, message: &str) {
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "-m", message]);
    }

    /// Commit with a pinned committer timestamp, for recency ordering.
    pub fn commit_all_at(&self, message: &str, epoch: i64) {
        self.git(&["add", "-A"]);
        let date = format!("@{epoch} +0000");
        let status = Command::new("git")
            .args(["commit", "-q", "-m", message])
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_DATE", &date)
            .current_dir(self.path())
            .status()
            .unwrap();
        assert!(status.success(), "pinned-date commit failed");
    }

    pub fn head_sha(&self) -> String {
        self.git(&["rev-parse", "HEAD"]).trim().to_string()
    }

    pub fn current_branch(&self) -> String {
        self.git(&["branch", "--show-current"]).trim().to_string()
    }

    /// Subject of the tip of a branch on the origin.
    pub fn origin_subject(&self, branch: &str) -> String {
        self.origin()
            .run_checked(&["log", "-1", "--pretty=format:%s", branch])
            .unwrap()
            .trim()
            .to_string()
    }
}

pub fn configure_identity(repo: &Repository) {
    repo.run_checked(&["config", "user.name", "Test User"]).unwrap();
    repo.run_checked(&["config", "user.email", "test@example.com"])
        .unwrap();
    repo.run_checked(&["config", "commit.gpgsign", "false"]).unwrap();
}

fn run_git_in(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

/// Host UI with scripted answers for menus, confirmations and inputs.
/// Unscripted questions fall back to the default answer.
pub struct ScriptedUi {
    default_confirm: bool,
    menu_answers: Mutex<VecDeque<Option<usize>>>,
    confirm_answers: Mutex<VecDeque<bool>>,
    input_answers: Mutex<VecDeque<Option<String>>>,
    lines: Mutex<Vec<String>>,
}

impl ScriptedUi {
    pub fn new(default_confirm: bool) -> Self {
        Self {
            default_confirm,
            menu_answers: Mutex::new(VecDeque::new()),
            confirm_answers: Mutex::new(VecDeque::new()),
            input_answers: Mutex::new(VecDeque::new()),
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_menu(&self, answer: Option<usize>) -> &Self {
        self.menu_answers.lock().unwrap().push_back(answer);
        self
    }

    pub fn queue_confirm(&self, answer: bool) -> &Self {
        self.confirm_answers.lock().unwrap().push_back(answer);
        self
    }

    pub fn queue_input(&self, answer: Option<&str>) -> &Self {
        self.input_answers
            .lock()
            .unwrap()
            .push_back(answer.map(str::to_owned));
        self
    }

    pub fn transcript(&self) -> String {
        self.lines.lock().unwrap().join("\n")
    }
}

impl HostUi for ScriptedUi {
    fn log(&self, _style: LogStyle, message: &str) {
        self.lines.lock().unwrap().push(message.to_string());
    }

    fn show_menu(
        &self,
        title: &str,
        _options: &[String],
        default_index: Option<usize>,
    ) -> Option<usize> {
        self.lines.lock().unwrap().push(format!("[menu] {title}"));
        match self.menu_answers.lock().unwrap().pop_front() {
            Some(answer) => answer,
            None => default_index.or(Some(0)).filter(|_| self.default_confirm),
        }
    }

    fn confirm(&self, question: &str) -> bool {
        self.lines.lock().unwrap().push(format!("[confirm] {question}"));
        self.confirm_answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default_confirm)
    }

    fn ask_input(&self, prompt: &str, default: Option<&str>) -> Option<String> {
        self.lines.lock().unwrap().push(format!("[input] {prompt}"));
        match self.input_answers.lock().unwrap().pop_front() {
            Some(answer) => answer,
            None => default.map(str::to_owned),
        }
    }

    fn show_preview(&self, steps: &[PreviewStep], _dry_run: bool) -> bool {
        for step in steps {
            self.lines
                .lock()
                .unwrap()
                .push(format!("[plan] {}", step.description));
        }
        self.default_confirm
    }

    fn show_confirmation(&self, title: &str, _message: &str, destructive: bool) -> bool {
        self.lines
            .lock()
            .unwrap()
            .push(format!("[confirmation destructive={destructive}] {title}"));
        self.confirm_answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default_confirm)
    }

    fn toast(&self, message: &str, _level: ToastLevel) {
        self.lines.lock().unwrap().push(format!("[toast] {message}"));
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            interactive: true,
            headless: false,
        }
    }
}
