//! Repository: the main entry point for twig operations.
//!
//! A Repository ties together the object store, refs, stage and working
//! tree. Every public operation validates its preconditions before its
//! first durable write, so a refused command leaves the repository as it
//! found it.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::checkout::{apply_checkout, checkout_path, plan_checkout};
use crate::commit::Commit;
use crate::error::{TwigError, TwigResult};
use crate::graph;
use crate::hash::blob_id;
use crate::index::{Removal, Stage};
use crate::merge::{self, MergeAction, MergeOutcome, MergePlan};
use crate::object::ObjectStore;
use crate::refs::RefStore;
use crate::remote::{self, Config, FetchResult, PushResult, RemoteEntry};
use crate::state::{self, Status};
use crate::worktree::WorkTree;

/// The `.twig` directory name.
pub const TWIG_DIR: &str = ".twig";

/// Name of the branch created by `init`.
pub const DEFAULT_BRANCH: &str = "master";

/// A twig repository.
pub struct Repository {
    /// Root of the working directory (where `.twig/` lives).
    root: PathBuf,
    /// Path to the `.twig/` directory.
    twig_dir: PathBuf,
    objects: ObjectStore,
    refs: RefStore,
    tree: WorkTree,
}

/// HEAD and the stage as loaded at the start of a command.
///
/// Commands mutate this value and persist it once at the end; nothing else
/// holds on to the stage in the meantime.
struct WorkingCopy {
    branch: String,
    head: Commit,
    stage: Stage,
}

impl Repository {
    /// Initialize a new repository in the given directory.
    ///
    /// Creates the `.twig/` layout, the root commit, and a `master` branch
    /// pointing at it.
    pub fn init(root: &Path) -> TwigResult<Self> {
        let twig_dir = root.join(TWIG_DIR);
        if twig_dir.exists() {
            return Err(TwigError::AlreadyExists);
        }

        let objects = ObjectStore::new(&twig_dir.join("objects"));
        let refs = RefStore::new(&twig_dir);
        objects.create_layout()?;
        refs.create_layout()?;

        let initial = Commit::initial();
        objects.put_commit(&initial)?;
        refs.update_branch(DEFAULT_BRANCH, &initial.id)?;
        refs.set_head(DEFAULT_BRANCH)?;
        Stage::default().save(&twig_dir.join("index"))?;
        Config::default().save(&twig_dir.join("config"))?;

        info!(root = %root.display(), "initialized repository");
        Self::open(root)
    }

    /// Open an existing repository rooted at `root`.
    pub fn open(root: &Path) -> TwigResult<Self> {
        let twig_dir = root.join(TWIG_DIR);
        if !twig_dir.is_dir() {
            return Err(TwigError::NotARepo);
        }
        Ok(Self {
            root: root.to_path_buf(),
            objects: ObjectStore::new(&twig_dir.join("objects")),
            refs: RefStore::new(&twig_dir),
            tree: WorkTree::new(root, TWIG_DIR),
            twig_dir,
        })
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// Name of the checked-out branch.
    pub fn current_branch(&self) -> TwigResult<String> {
        self.refs.current_branch()
    }

    /// The commit the checked-out branch points to.
    pub fn head_commit(&self) -> TwigResult<Commit> {
        let id = self.refs.current_commit_id()?;
        self.objects.get_commit(&id).map_err(integrity)
    }

    /// The persisted stage.
    pub fn stage(&self) -> TwigResult<Stage> {
        Stage::load(&self.index_path())
    }

    // --- Staging and committing ---

    /// Stage the current content of `path`.
    pub fn add(&self, path: &str) -> TwigResult<()> {
        let path = self.tree.normalize(path)?;
        if !self.tree.exists(&path) {
            return Err(TwigError::FileDoesNotExist(path));
        }
        let mut wc = self.working_copy()?;
        let content = self.tree.read(&path)?;
        let id = blob_id(&path, &content);
        if wc.head.blob(&path) != Some(id.as_str()) {
            self.objects.put_blob(&path, &content)?;
        }
        wc.stage.record_add(&path, &id, &wc.head);
        self.save_stage(&wc.stage)?;
        info!(path = %path, blob = %id, "staged file");
        Ok(())
    }

    /// Create a commit from the stage on the current branch.
    pub fn commit(&self, message: &str) -> TwigResult<Commit> {
        if message.trim().is_empty() {
            return Err(TwigError::EmptyCommitMessage);
        }
        let mut wc = self.working_copy()?;
        if wc.stage.is_empty() {
            return Err(TwigError::NoChangesToCommit);
        }
        let parents = vec![wc.head.id.clone()];
        self.finish_commit(&mut wc, message, parents)
    }

    /// Write the commit for `wc`'s stage, advance the branch, clear the stage.
    fn finish_commit(&self, wc: &mut WorkingCopy, message: &str, parents: Vec<String>) -> TwigResult<Commit> {
        let blobs = wc.stage.snapshot(&wc.head.blobs);
        let commit = Commit::new(message, parents, blobs);
        self.objects.put_commit(&commit)?;
        self.refs.update_branch(&wc.branch, &commit.id)?;
        wc.stage.clear();
        self.save_stage(&wc.stage)?;
        info!(branch = %wc.branch, commit = %commit.id, "created commit");
        Ok(commit)
    }

    /// Unstage `path`, or stage its removal and delete it if tracked.
    pub fn remove(&self, path: &str) -> TwigResult<()> {
        let path = self.tree.normalize(path)?;
        let mut wc = self.working_copy()?;
        let removal = wc.stage.record_remove(&path, &wc.head)?;
        if removal == Removal::Untracked {
            self.tree.delete(&path)?;
        }
        self.save_stage(&wc.stage)?;
        info!(path = %path, ?removal, "removed file");
        Ok(())
    }

    // --- History ---

    /// First-parent history of HEAD, newest first, ending with the root.
    pub fn log(&self) -> TwigResult<Vec<Commit>> {
        graph::history_from(&self.objects, &self.head_commit()?)
    }

    /// Every commit ever made, in id order.
    pub fn global_log(&self) -> TwigResult<Vec<Commit>> {
        graph::all_commits(&self.objects)
    }

    /// Ids of all commits whose message is exactly `message`.
    pub fn find(&self, message: &str) -> TwigResult<Vec<String>> {
        let ids: Vec<String> = graph::all_commits(&self.objects)?
            .into_iter()
            .filter(|c| c.message == message)
            .map(|c| c.id)
            .collect();
        if ids.is_empty() {
            return Err(TwigError::NoCommitWithMessage);
        }
        Ok(ids)
    }

    /// Resolve a full or abbreviated commit id.
    pub fn resolve_commit(&self, id: &str) -> TwigResult<Commit> {
        let full = self.objects.resolve_short_id(id)?;
        self.objects.get_commit(&full)
    }

    // --- Working tree ---

    /// Branches, stage and working-tree classification.
    pub fn status(&self) -> TwigResult<Status> {
        let wc = self.working_copy()?;
        let mut status = state::compute_status(&wc.head, &wc.stage, &self.tree)?;
        status.branches = self.refs.branch_names()?;
        status.current_branch = wc.branch;
        Ok(status)
    }

    /// Restore `path` to its version in HEAD.
    pub fn checkout_file(&self, path: &str) -> TwigResult<()> {
        let path = self.tree.normalize(path)?;
        checkout_path(&path, &self.head_commit()?, &self.objects, &self.tree)
    }

    /// Restore `path` to its version in the commit `commit_id` (may be short).
    pub fn checkout_file_from(&self, commit_id: &str, path: &str) -> TwigResult<()> {
        let commit = self.resolve_commit(commit_id)?;
        let path = self.tree.normalize(path)?;
        checkout_path(&path, &commit, &self.objects, &self.tree)
    }

    /// Switch to another local branch.
    pub fn checkout_branch(&self, name: &str) -> TwigResult<()> {
        let target_id = self
            .refs
            .branch(name)?
            .ok_or_else(|| TwigError::UnknownBranch(name.to_string()))?;
        let mut wc = self.working_copy()?;
        if wc.branch == name {
            return Err(TwigError::AlreadyOnBranch);
        }
        let target = self.objects.get_commit(&target_id).map_err(integrity)?;
        self.switch_to(&mut wc, &target)?;
        self.refs.set_head(name)?;
        info!(from = %wc.branch, to = name, "checked out branch");
        Ok(())
    }

    /// Move the working tree from `wc.head` to `target` and clear the stage.
    fn switch_to(&self, wc: &mut WorkingCopy, target: &Commit) -> TwigResult<()> {
        let plan = plan_checkout(&wc.head, target, &self.tree)?;
        apply_checkout(&plan, &self.objects, &self.tree)?;
        wc.stage.clear();
        self.save_stage(&wc.stage)
    }

    // --- Branches ---

    /// Create a branch at HEAD. Does not switch to it.
    pub fn branch(&self, name: &str) -> TwigResult<()> {
        let head = self.refs.current_commit_id()?;
        self.refs.create_branch(name, &head)?;
        info!(branch = name, commit = %head, "created branch");
        Ok(())
    }

    /// Delete a branch pointer.
    pub fn remove_branch(&self, name: &str) -> TwigResult<()> {
        self.refs.delete_branch(name)
    }

    /// Check out an arbitrary commit and move the current branch to it.
    pub fn reset(&self, commit_id: &str) -> TwigResult<()> {
        let target = self.resolve_commit(commit_id)?;
        let mut wc = self.working_copy()?;
        self.switch_to(&mut wc, &target)?;
        self.refs.update_branch(&wc.branch, &target.id)?;
        info!(branch = %wc.branch, commit = %target.id, "reset branch");
        Ok(())
    }

    // --- Merge ---

    /// Merge the branch `name` into the current branch.
    ///
    /// `name` may be a local branch or a `<remote>/<branch>` tracking ref.
    pub fn merge(&self, name: &str) -> TwigResult<MergeOutcome> {
        let mut wc = self.working_copy()?;
        if !wc.stage.is_empty() {
            return Err(TwigError::UncommittedChanges);
        }
        let target_id = self
            .refs
            .resolve(name)?
            .ok_or_else(|| TwigError::NoSuchBranch(name.to_string()))?;
        if name == wc.branch {
            return Err(TwigError::SelfMerge);
        }
        let target = self.objects.get_commit(&target_id).map_err(integrity)?;
        let split = graph::split_point(&self.objects, &wc.head, &target)?;

        if split.id == target.id {
            return Err(TwigError::AlreadyAncestor);
        }
        if split.id == wc.head.id {
            self.switch_to(&mut wc, &target)?;
            self.refs.update_branch(&wc.branch, &target.id)?;
            info!(branch = %wc.branch, commit = %target.id, "fast-forwarded");
            return Ok(MergeOutcome::FastForward { commit: target.id });
        }

        let plan = merge::plan_merge(&split, &wc.head, &target);
        self.check_merge_slots(&plan)?;

        let mut conflicts = Vec::new();
        for (path, action) in &plan.actions {
            match action {
                MergeAction::TakeTarget { blob } => {
                    self.tree.write(path, &self.objects.get_blob(blob)?)?;
                    wc.stage.stage_addition(path, blob);
                }
                MergeAction::Delete { blob } => {
                    self.tree.delete(path)?;
                    wc.stage.stage_removal(path, blob);
                }
                MergeAction::Conflict { current, target } => {
                    let ours = self.blob_or_empty(current.as_deref())?;
                    let theirs = self.blob_or_empty(target.as_deref())?;
                    let content = merge::conflict_content(&ours, &theirs);
                    let blob = self.objects.put_blob(path, &content)?;
                    self.tree.write(path, &content)?;
                    wc.stage.stage_addition(path, &blob);
                    warn!(path = %path, "merge conflict");
                    conflicts.push(path.clone());
                }
            }
        }

        let message = merge::merge_message(name, &wc.branch);
        let parents = vec![wc.head.id.clone(), target.id.clone()];
        let commit = self.finish_commit(&mut wc, &message, parents)?;
        Ok(MergeOutcome::Merged {
            commit: commit.id,
            conflicts,
        })
    }

    /// Refuse a merge whose writes would clobber something untracked.
    fn check_merge_slots(&self, plan: &MergePlan) -> TwigResult<()> {
        for path in &plan.needs_free_slot {
            if self.tree.exists(path) || self.tree.is_dir(path) {
                return Err(TwigError::UntrackedFileConflict(path.clone()));
            }
        }
        for (path, action) in &plan.actions {
            if matches!(action, MergeAction::Delete { .. }) {
                continue;
            }
            // A file being deleted earlier in the same merge frees its slot.
            if let Some(blocker) = self.tree.file_ancestor(path) {
                if !matches!(plan.actions.get(&blocker), Some(MergeAction::Delete { .. })) {
                    return Err(TwigError::UntrackedFileConflict(blocker));
                }
            }
        }
        Ok(())
    }

    fn blob_or_empty(&self, id: Option<&str>) -> TwigResult<Vec<u8>> {
        match id {
            Some(id) => self.objects.get_blob(id),
            None => Ok(Vec::new()),
        }
    }

    // --- Remotes ---

    /// Register a remote repository by the path of its `.twig` directory.
    pub fn add_remote(&self, name: &str, path: &str) -> TwigResult<()> {
        RefStore::validate_name(name)?;
        let mut config = self.load_config()?;
        if config.remotes.contains_key(name) {
            return Err(TwigError::RemoteExists(name.to_string()));
        }
        config.remotes.insert(
            name.to_string(),
            RemoteEntry {
                path: path.to_string(),
            },
        );
        self.save_config(&config)
    }

    /// Forget a remote. Its remote-tracking refs stay.
    pub fn remove_remote(&self, name: &str) -> TwigResult<()> {
        let mut config = self.load_config()?;
        if config.remotes.remove(name).is_none() {
            return Err(TwigError::RemoteNotFound(name.to_string()));
        }
        self.save_config(&config)
    }

    /// Send the current branch's history to `branch` on `remote_name`.
    ///
    /// The remote branch must not have commits the local head lacks.
    pub fn push(&self, remote_name: &str, branch: &str) -> TwigResult<PushResult> {
        RefStore::validate_name(branch)?;
        let (remote_objects, remote_refs) = self.open_remote(remote_name)?;
        let head = self.head_commit()?;

        if let Some(remote_head) = remote_refs.branch(branch)? {
            if !graph::is_ancestor(&self.objects, &remote_head, &head)? {
                return Err(TwigError::PushRejected);
            }
        }

        let count = remote::transfer_history(&self.objects, &remote_objects, &head)?;
        remote_refs.update_branch(branch, &head.id)?;
        info!(remote = remote_name, branch, commit = %head.id, "pushed");
        Ok(PushResult {
            remote: remote_name.to_string(),
            branch: branch.to_string(),
            commits_pushed: count.commits,
            blobs_pushed: count.blobs,
            head: head.id,
        })
    }

    /// Copy `branch` from `remote_name` into `refs/remotes/<remote>/<branch>`.
    pub fn fetch(&self, remote_name: &str, branch: &str) -> TwigResult<FetchResult> {
        let (remote_objects, remote_refs) = self.open_remote(remote_name)?;
        let tip_id = remote_refs
            .branch(branch)?
            .ok_or_else(|| TwigError::RemoteBranchMissing(branch.to_string()))?;
        let tip = remote_objects.get_commit(&tip_id).map_err(integrity)?;

        let count = remote::transfer_history(&remote_objects, &self.objects, &tip)?;
        self.refs.update_remote_branch(remote_name, branch, &tip.id)?;
        info!(remote = remote_name, branch, commit = %tip.id, "fetched");
        Ok(FetchResult {
            remote: remote_name.to_string(),
            branch: branch.to_string(),
            commits_fetched: count.commits,
            blobs_fetched: count.blobs,
            head: tip.id,
        })
    }

    /// Fetch `branch` from `remote_name` and merge it into the current branch.
    pub fn pull(&self, remote_name: &str, branch: &str) -> TwigResult<(FetchResult, MergeOutcome)> {
        if !self.stage()?.is_empty() {
            return Err(TwigError::UncommittedChanges);
        }
        let fetched = self.fetch(remote_name, branch)?;
        let outcome = self.merge(&format!("{remote_name}/{branch}"))?;
        Ok((fetched, outcome))
    }

    fn open_remote(&self, name: &str) -> TwigResult<(ObjectStore, RefStore)> {
        let config = self.load_config()?;
        let entry = config
            .remotes
            .get(name)
            .ok_or_else(|| TwigError::RemoteNotFound(name.to_string()))?;
        let path = Path::new(&entry.path);
        let remote_dir = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        if !remote_dir.join("objects").is_dir() || !remote_dir.join("HEAD").is_file() {
            return Err(TwigError::RemoteDirMissing(entry.path.clone()));
        }
        Ok((
            ObjectStore::new(&remote_dir.join("objects")),
            RefStore::new(&remote_dir),
        ))
    }

    // --- Persistence helpers ---

    fn working_copy(&self) -> TwigResult<WorkingCopy> {
        Ok(WorkingCopy {
            branch: self.refs.current_branch()?,
            head: self.head_commit()?,
            stage: self.stage()?,
        })
    }

    fn save_stage(&self, stage: &Stage) -> TwigResult<()> {
        stage.save(&self.index_path())
    }

    fn index_path(&self) -> PathBuf {
        self.twig_dir.join("index")
    }

    fn load_config(&self) -> TwigResult<Config> {
        Config::load(&self.twig_dir.join("config"))
    }

    fn save_config(&self, config: &Config) -> TwigResult<()> {
        config.save(&self.twig_dir.join("config"))
    }
}

/// A commit named by a ref must exist; its absence is corruption.
fn integrity(e: TwigError) -> TwigError {
    match e {
        TwigError::CommitNotFound(id) => TwigError::Integrity(format!("ref points at missing commit {id}")),
        other => other,
    }
}
