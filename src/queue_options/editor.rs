use futures::future::join_all;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::node::NodeKey;
use super::tree::{OptionTree, OutlineRow};
use crate::api::{Attachment, ParentFilter, QueueOptionsApi};
use crate::error::{ClientError, ClientResult};
use crate::i18n::Translations;
use crate::models::Queue;
use crate::toast::{toast_error, Toaster};

/// Edits the option tree of one queue against the remote collection.
///
/// The tree lock is only held to read or swap the tree, never across a
/// request. Every completion re-applies to whatever tree is current, looked
/// up by [`NodeKey`]; results for nodes removed in the meantime are dropped.
pub struct OptionTreeEditor<A: QueueOptionsApi> {
    api: Arc<A>,
    tree: Arc<Mutex<OptionTree>>,
    toaster: Arc<dyn Toaster>,
    translations: Translations,
}

impl<A: QueueOptionsApi> Clone for OptionTreeEditor<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            tree: self.tree.clone(),
            toaster: self.toaster.clone(),
            translations: self.translations.clone(),
        }
    }
}

impl<A: QueueOptionsApi> OptionTreeEditor<A> {
    pub fn new(
        api: Arc<A>,
        queue_id: i64,
        toaster: Arc<dyn Toaster>,
        translations: Translations,
    ) -> Self {
        Self {
            api,
            tree: Arc::new(Mutex::new(OptionTree::new(queue_id))),
            toaster,
            translations,
        }
    }

    pub async fn snapshot(&self) -> OptionTree {
        self.tree.lock().await.clone()
    }

    pub async fn outline(&self) -> Vec<OutlineRow> {
        self.tree.lock().await.outline(&self.translations)
    }

    fn report(&self, err: &ClientError) {
        toast_error(self.toaster.as_ref(), &self.translations, err);
    }

    fn missing(key: NodeKey) -> ClientError {
        ClientError::NotFound(format!("option node {key}"))
    }

    /// Swaps in `f(current)`; `None` means the key is gone.
    async fn apply(
        &self,
        key: NodeKey,
        f: impl FnOnce(&OptionTree) -> Option<OptionTree>,
    ) -> ClientResult<()> {
        let mut tree = self.tree.lock().await;
        let next = f(&*tree).ok_or_else(|| Self::missing(key))?;
        *tree = next;
        Ok(())
    }

    pub async fn load_roots(&self) -> ClientResult<usize> {
        let queue_id = self.tree.lock().await.queue_id();
        let records = match self.api.list_options(queue_id, ParentFilter::Roots).await {
            Ok(records) => records,
            Err(e) => {
                self.report(&e);
                return Err(e);
            }
        };

        let count = records.len();
        let mut tree = self.tree.lock().await;
        *tree = tree.with_roots(records);
        debug!("Loaded {} root options for queue {}", count, queue_id);
        Ok(count)
    }

    /// Shows a node's children, fetching them on first expansion only.
    pub async fn expand(&self, key: NodeKey) -> ClientResult<()> {
        let (queue_id, parent_id) = {
            let mut tree = self.tree.lock().await;
            let (id, loaded) = {
                let node = tree.find(key).ok_or_else(|| Self::missing(key))?;
                (node.id, node.children_loaded)
            };
            match id {
                Some(id) if !loaded => (tree.queue_id(), id),
                _ => {
                    if let Some(next) = tree.update(key, |n| n.expanded = true) {
                        *tree = next;
                    }
                    return Ok(());
                }
            }
        };

        let records = match self
            .api
            .list_options(queue_id, ParentFilter::Children(parent_id))
            .await
        {
            Ok(records) => records,
            Err(e) => {
                self.report(&e);
                return Err(e);
            }
        };

        let mut tree = self.tree.lock().await;
        match tree.find(key).map(|n| n.children_loaded) {
            Some(true) => {
                debug!("Children of {} already loaded, dropping duplicate fetch", key);
                if let Some(next) = tree.update(key, |n| n.expanded = true) {
                    *tree = next;
                }
            }
            Some(false) => {
                if let Some(next) = tree.with_children(key, records) {
                    *tree = next;
                }
            }
            None => debug!("Option {} removed before its children arrived", key),
        }
        Ok(())
    }

    pub async fn collapse(&self, key: NodeKey) -> ClientResult<()> {
        self.apply(key, |tree| tree.update(key, |n| n.expanded = false))
            .await
    }

    pub async fn add_root(&self) -> NodeKey {
        let mut tree = self.tree.lock().await;
        let (next, key) = tree.with_root_draft();
        *tree = next;
        key
    }

    /// Appends a draft under a saved parent, loading its siblings first.
    pub async fn add_child(&self, parent: NodeKey) -> ClientResult<NodeKey> {
        let saved = {
            let tree = self.tree.lock().await;
            let node = tree.find(parent).ok_or_else(|| Self::missing(parent))?;
            !node.is_draft()
        };
        if !saved {
            let err = ClientError::Invalid("save the option before adding sub-options".to_string());
            self.report(&err);
            return Err(err);
        }

        self.expand(parent).await?;

        let mut tree = self.tree.lock().await;
        let (next, key) = tree.with_child_draft(parent)?;
        *tree = next;
        Ok(key)
    }

    pub async fn toggle_edit(&self, key: NodeKey) -> ClientResult<bool> {
        let mut tree = self.tree.lock().await;
        let next = tree
            .update(key, |n| n.editing = !n.editing)
            .ok_or_else(|| Self::missing(key))?;
        let editing = next.find(key).map(|n| n.editing).unwrap_or_default();
        *tree = next;
        Ok(editing)
    }

    pub async fn set_title(&self, key: NodeKey, title: &str) -> ClientResult<()> {
        let title = title.to_string();
        self.apply(key, |tree| tree.update(key, |n| n.title = title))
            .await
    }

    pub async fn set_message(&self, key: NodeKey, message: &str) -> ClientResult<()> {
        let message = message.to_string();
        self.apply(key, |tree| tree.update(key, |n| n.message = message))
            .await
    }

    /// Stages a file; it is uploaded on the next save.
    pub async fn attach(&self, key: NodeKey, attachment: Attachment) -> ClientResult<()> {
        self.apply(key, |tree| {
            tree.update(key, |n| n.pending_attachment = Some(attachment))
        })
        .await
    }

    /// Refused while a forward target is set; clear the target first.
    pub async fn toggle_exit_chatbot(&self, key: NodeKey) -> ClientResult<bool> {
        let mut tree = self.tree.lock().await;
        let disabled = tree
            .find(key)
            .ok_or_else(|| Self::missing(key))?
            .exit_switch_disabled();
        if disabled {
            return Err(ClientError::Invalid(format!(
                "option {key} forwards to a queue, exit switch is disabled"
            )));
        }
        let next = tree
            .update(key, |n| {
                let exit = !n.exit_chatbot();
                n.set_exit_chatbot(exit);
            })
            .ok_or_else(|| Self::missing(key))?;
        let exit = next.find(key).map(|n| n.exit_chatbot()).unwrap_or_default();
        *tree = next;
        Ok(exit)
    }

    /// Refused while the option exits the chatbot; an empty id only clears.
    pub async fn set_forward_queue(&self, key: NodeKey, queue_id: &str) -> ClientResult<()> {
        let queue_id = queue_id.trim().to_string();
        let mut tree = self.tree.lock().await;
        let disabled = tree
            .find(key)
            .ok_or_else(|| Self::missing(key))?
            .forward_selector_disabled();
        if disabled && !queue_id.is_empty() {
            return Err(ClientError::Invalid(format!(
                "option {key} exits the chatbot, queue selector is disabled"
            )));
        }
        let next = tree
            .update(key, |n| n.set_forward_queue(queue_id))
            .ok_or_else(|| Self::missing(key))?;
        *tree = next;
        Ok(())
    }

    /// Creates or updates the node, then uploads any staged attachment.
    /// Returns the server id.
    pub async fn save(&self, key: NodeKey) -> ClientResult<i64> {
        let (known_id, payload, attachment) = {
            let tree = self.tree.lock().await;
            let node = tree.find(key).ok_or_else(|| Self::missing(key))?;
            (node.id, node.payload(), node.pending_attachment.clone())
        };

        let id = match known_id {
            Some(id) => match self.api.update_option(id, &payload).await {
                Ok(()) => id,
                Err(e) => {
                    self.report(&e);
                    return Err(e);
                }
            },
            None => match self.api.create_option(&payload).await {
                Ok(id) => {
                    let mut tree = self.tree.lock().await;
                    match tree.update(key, |n| n.id = Some(id)) {
                        Some(next) => *tree = next,
                        None => warn!("Option {} was removed while saving, orphaned id {}", key, id),
                    }
                    id
                }
                Err(e) => {
                    self.report(&e);
                    return Err(e);
                }
            },
        };

        if let Some(attachment) = attachment {
            match self.api.upload_media(id, &attachment).await {
                Ok(media) => {
                    let mut tree = self.tree.lock().await;
                    if let Some(next) = tree.update(key, |n| n.store_media(media)) {
                        *tree = next;
                    }
                }
                Err(e) => {
                    self.report(&e);
                    return Err(e);
                }
            }
        }

        let mut tree = self.tree.lock().await;
        if let Some(next) = tree.update(key, |n| n.editing = false) {
            *tree = next;
        }
        info!("Saved queue option {} ({})", id, key);
        Ok(id)
    }

    /// Deletes remotely (a failure is only reported), removes the node
    /// locally and persists the renumbered siblings.
    pub async fn delete(&self, key: NodeKey) -> ClientResult<()> {
        let id = {
            let tree = self.tree.lock().await;
            tree.find(key).ok_or_else(|| Self::missing(key))?.id
        };

        if let Some(id) = id {
            if let Err(e) = self.api.delete_option(id).await {
                self.report(&e);
            }
        }

        let updates = {
            let mut tree = self.tree.lock().await;
            let Some((next, renumbered)) = tree.without(key) else {
                debug!("Option {} already removed", key);
                return Ok(());
            };
            let updates: Vec<_> = renumbered
                .iter()
                .filter_map(|k| next.find(*k))
                .filter_map(|n| n.id.map(|id| (id, n.payload())))
                .collect();
            *tree = next;
            updates
        };

        if updates.is_empty() {
            return Ok(());
        }

        debug!("Persisting {} renumbered options", updates.len());
        let results = join_all(
            updates
                .iter()
                .map(|(id, payload)| self.api.update_option(*id, payload)),
        )
        .await;
        for err in results.into_iter().filter_map(Result::err) {
            self.report(&err);
        }
        Ok(())
    }

    /// Drops the staged file and the persisted media, if any.
    pub async fn delete_attachment(&self, key: NodeKey) -> ClientResult<()> {
        let remote = {
            let mut tree = self.tree.lock().await;
            let next = tree
                .update(key, |n| n.pending_attachment = None)
                .ok_or_else(|| Self::missing(key))?;
            let remote = next.find(key).filter(|n| n.has_media()).and_then(|n| n.id);
            *tree = next;
            remote
        };

        let Some(id) = remote else {
            return Ok(());
        };

        if let Err(e) = self.api.delete_media(id).await {
            self.report(&e);
            return Err(e);
        }

        let mut tree = self.tree.lock().await;
        if let Some(next) = tree.update(key, |n| n.clear_media()) {
            *tree = next;
        }
        Ok(())
    }

    /// Targets for the forward-to-queue selector.
    pub async fn available_queues(&self) -> ClientResult<Vec<Queue>> {
        self.api.list_queues().await.map_err(|e| {
            self.report(&e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MediaRef, QueueOptionPayload, QueueOptionRecord};
    use crate::i18n::Locale;
    use crate::toast::ToastLog;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeApi {
        options: StdMutex<HashMap<i64, Vec<QueueOptionRecord>>>,
        calls: StdMutex<Vec<String>>,
        next_id: AtomicI64,
        fail_delete: AtomicBool,
        fail_upload: AtomicBool,
    }

    impl FakeApi {
        fn with_options(parent: i64, records: Vec<QueueOptionRecord>) -> Self {
            let api = Self::default();
            api.next_id.store(501, Ordering::SeqCst);
            api.options.lock().unwrap().insert(parent, records);
            api
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl QueueOptionsApi for FakeApi {
        async fn list_options(
            &self,
            _queue_id: i64,
            parent: ParentFilter,
        ) -> ClientResult<Vec<QueueOptionRecord>> {
            self.log(format!("list {}", parent.as_query()));
            Ok(self
                .options
                .lock()
                .unwrap()
                .get(&parent.as_query())
                .cloned()
                .unwrap_or_default())
        }

        async fn create_option(&self, payload: &QueueOptionPayload) -> ClientResult<i64> {
            self.log(format!("create {}", payload.title));
            Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
        }

        async fn update_option(&self, id: i64, payload: &QueueOptionPayload) -> ClientResult<()> {
            self.log(format!("update {} option={}", id, payload.option));
            Ok(())
        }

        async fn delete_option(&self, id: i64) -> ClientResult<()> {
            self.log(format!("delete {id}"));
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(ClientError::Invalid("delete refused".to_string()));
            }
            Ok(())
        }

        async fn upload_media(&self, id: i64, attachment: &Attachment) -> ClientResult<MediaRef> {
            self.log(format!("upload {} {}", id, attachment.file_name));
            if self.fail_upload.load(Ordering::SeqCst) {
                return Err(ClientError::Invalid("upload refused".to_string()));
            }
            Ok(MediaRef {
                media_path: format!("public/{}", attachment.file_name),
                media_name: attachment.file_name.clone(),
            })
        }

        async fn delete_media(&self, id: i64) -> ClientResult<()> {
            self.log(format!("delete-media {id}"));
            Ok(())
        }

        async fn list_queues(&self) -> ClientResult<Vec<Queue>> {
            Ok(vec![Queue { id: 7, name: "Financeiro".to_string(), color: None }])
        }
    }

    fn record(id: i64, option: u32, parent_id: Option<i64>) -> QueueOptionRecord {
        QueueOptionRecord {
            id,
            title: format!("option {id}"),
            message: String::new(),
            option,
            queue_id: 2,
            parent_id,
            media_path: None,
            media_name: None,
            forward_queue_id: String::new(),
            exit_chatbot: false,
        }
    }

    fn editor(api: FakeApi) -> (OptionTreeEditor<FakeApi>, Arc<FakeApi>, Arc<ToastLog>) {
        let api = Arc::new(api);
        let toasts = Arc::new(ToastLog::new());
        let editor = OptionTreeEditor::new(
            api.clone(),
            2,
            toasts.clone(),
            Translations::for_locale(&Locale::default()),
        );
        (editor, api, toasts)
    }

    #[tokio::test]
    async fn test_expand_fetches_once() {
        let api = FakeApi::with_options(-1, vec![record(1, 1, None)]);
        api.options.lock().unwrap().insert(1, vec![record(5, 1, Some(1))]);
        let (editor, api, _toasts) = editor(api);

        editor.load_roots().await.unwrap();
        let root = editor.snapshot().await.roots()[0].key;
        editor.expand(root).await.unwrap();
        editor.collapse(root).await.unwrap();
        editor.expand(root).await.unwrap();

        let fetches = api.calls().iter().filter(|c| *c == "list 1").count();
        assert_eq!(fetches, 1);
        assert_eq!(editor.outline().await.len(), 2);
    }

    #[tokio::test]
    async fn test_save_with_attachment_uploads_after_create() {
        let (editor, api, _toasts) = editor(FakeApi::with_options(-1, vec![]));
        let key = editor.add_root().await;
        editor.set_title(key, "Boletos").await.unwrap();
        editor
            .attach(key, Attachment::new("menu.pdf", vec![1, 2]))
            .await
            .unwrap();

        let id = editor.save(key).await.unwrap();

        assert_eq!(id, 501);
        assert_eq!(api.calls(), vec!["create Boletos", "upload 501 menu.pdf"]);
        let tree = editor.snapshot().await;
        let node = tree.find(key).unwrap();
        assert!(!node.editing);
        assert!(node.pending_attachment.is_none());
        assert_eq!(node.media_name.as_deref(), Some("menu.pdf"));
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_edit_mode() {
        let api = FakeApi::with_options(-1, vec![]);
        api.fail_upload.store(true, Ordering::SeqCst);
        let (editor, _api, toasts) = editor(api);
        let key = editor.add_root().await;
        editor
            .attach(key, Attachment::new("a.png", vec![0]))
            .await
            .unwrap();

        assert!(editor.save(key).await.is_err());

        let tree = editor.snapshot().await;
        let node = tree.find(key).unwrap();
        assert!(node.editing);
        assert_eq!(node.id, Some(501));
        assert!(node.pending_attachment.is_some());
        assert_eq!(
            toasts.errors(),
            vec!["Invalid operation: upload refused".to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_failure_still_removes_locally() {
        let api = FakeApi::with_options(
            -1,
            vec![record(1, 1, None), record(2, 2, None), record(3, 3, None)],
        );
        api.fail_delete.store(true, Ordering::SeqCst);
        let (editor, api, toasts) = editor(api);
        editor.load_roots().await.unwrap();
        let first = editor.snapshot().await.roots()[0].key;

        editor.delete(first).await.unwrap();

        let tree = editor.snapshot().await;
        let ordinals: Vec<u32> = tree.roots().iter().map(|n| n.option).collect();
        assert_eq!(ordinals, vec![1, 2]);
        assert_eq!(toasts.errors().len(), 1);

        let mut updates: Vec<String> = api
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("update"))
            .collect();
        updates.sort();
        assert_eq!(updates, vec!["update 2 option=1", "update 3 option=2"]);
    }

    #[tokio::test]
    async fn test_deleting_draft_skips_remote() {
        let (editor, api, _toasts) = editor(FakeApi::with_options(-1, vec![]));
        let key = editor.add_root().await;
        editor.delete(key).await.unwrap();
        assert!(editor.snapshot().await.is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_add_child_to_draft_is_rejected() {
        let (editor, _api, toasts) = editor(FakeApi::with_options(-1, vec![]));
        let key = editor.add_root().await;
        assert!(matches!(editor.add_child(key).await, Err(ClientError::Invalid(_))));
        assert_eq!(toasts.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_attachment_clears_remote_media() {
        let mut with_media = record(1, 1, None);
        with_media.media_path = Some("public/a.png".to_string());
        with_media.media_name = Some("a.png".to_string());
        let (editor, api, _toasts) = editor(FakeApi::with_options(-1, vec![with_media]));
        editor.load_roots().await.unwrap();
        let key = editor.snapshot().await.roots()[0].key;

        editor.delete_attachment(key).await.unwrap();

        assert!(api.calls().contains(&"delete-media 1".to_string()));
        assert!(!editor.snapshot().await.find(key).unwrap().has_media());
    }

    #[tokio::test]
    async fn test_exit_toggle_and_queues() {
        let (editor, _api, _toasts) = editor(FakeApi::with_options(-1, vec![]));
        let key = editor.add_root().await;
        editor.set_forward_queue(key, "7").await.unwrap();
        assert!(matches!(
            editor.toggle_exit_chatbot(key).await,
            Err(ClientError::Invalid(_))
        ));
        assert_eq!(editor.snapshot().await.find(key).unwrap().forward_queue_id(), "7");

        editor.set_forward_queue(key, "").await.unwrap();
        assert!(editor.toggle_exit_chatbot(key).await.unwrap());
        assert!(matches!(
            editor.set_forward_queue(key, "9").await,
            Err(ClientError::Invalid(_))
        ));
        let tree = editor.snapshot().await;
        let node = tree.find(key).unwrap();
        assert!(node.exit_chatbot());
        assert_eq!(node.forward_queue_id(), "");

        let queues = editor.available_queues().await.unwrap();
        assert_eq!(queues[0].id, 7);
    }
}
