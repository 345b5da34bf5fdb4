//! High-level proxy operations over the credential pool.
//!
//! The [`Drive`] facade is what the HTTP layer talks to. It selects (or
//! re-pins) an identity, performs the upstream calls, and re-seals any
//! cursor the upstream hands back before it ever reaches a client.

use std::collections::HashMap;
use std::sync::Arc;

use drivegate_accounts::{Account, AccountPool, TokenBroker};
use drivegate_common::Result;
use drivegate_crypto::TokenSealer;

use crate::client::DriveClient;
use crate::continuation::Continuations;
use crate::types::{CopyInit, DriveFile, FileList, UploadPoll};

/// Stateless Drive proxy: pool selection + token brokerage + API calls +
/// continuation sealing. Holds no per-request state.
pub struct Drive {
    pool: AccountPool,
    client: DriveClient,
    continuations: Continuations,
}

impl Drive {
    pub fn new(pool: AccountPool, sealer: TokenSealer, http: reqwest::Client) -> Self {
        let broker = Arc::new(TokenBroker::new(http.clone()));
        Self {
            pool,
            client: DriveClient::new(http, broker),
            continuations: Continuations::new(sealer),
        }
    }

    /// Identity for this call: the one pinned in a continuation token if
    /// present, otherwise a fresh pool selection.
    async fn pin_or_select(&self, pinned: Option<Account>) -> Result<Arc<Account>> {
        match pinned {
            Some(account) => Ok(Arc::new(account)),
            None => self.pool.select().await,
        }
    }

    /// List children of a parent, or top-level drives when no parent is
    /// given. A returned cursor is sealed before leaving the process.
    pub async fn ls(
        &self,
        parent: Option<&str>,
        order_by: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<FileList> {
        let (pinned, cursor) = match page_token {
            Some(token) if !token.is_empty() => {
                let (credential, cursor) = self.continuations.accept_list(token)?;
                (Some(Account::new(credential)), Some(cursor))
            }
            _ => (None, None),
        };
        let account = self.pin_or_select(pinned).await?;

        let page = self
            .client
            .list_children(&account, parent, order_by, cursor.as_deref())
            .await?;

        let next_page_token = match page.next_cursor {
            Some(cursor) => Some(
                self.continuations
                    .issue_list(account.credential(), &cursor)?,
            ),
            None => None,
        };

        Ok(FileList {
            next_page_token,
            files: page.files,
            drives: page.drives,
        })
    }

    /// Full-text search across the given drive scope (empty = global).
    pub async fn search(
        &self,
        query: &str,
        drive_scope: &[String],
        page_token: Option<&str>,
    ) -> Result<FileList> {
        let (pinned, cursors) = match page_token {
            Some(token) if !token.is_empty() => {
                let (credential, cursors) = self.continuations.accept_search(token)?;
                (Some(Account::new(credential)), cursors)
            }
            _ => (None, HashMap::new()),
        };
        let account = self.pin_or_select(pinned).await?;

        let page = self
            .client
            .search(&account, query, drive_scope, cursors)
            .await?;

        let next_page_token = self
            .continuations
            .issue_search(account.credential(), &page.cursors)?;

        Ok(FileList {
            next_page_token,
            files: Some(page.files),
            drives: None,
        })
    }

    /// Single-node metadata, with the drive probe merged in.
    pub async fn file(&self, id: &str) -> Result<DriveFile> {
        let account = self.pool.select().await?;
        self.client.get_node(&account, id).await
    }

    /// Raw content stream with verbatim `Range` forwarding.
    pub async fn download(&self, id: &str, range: Option<&str>) -> Result<reqwest::Response> {
        let account = self.pool.select().await?;
        self.client.download(&account, id, range).await
    }

    /// Step one of the relay: open an upstream resumable session sized to
    /// the source node and hand its id back to the caller. The handle is
    /// the only state carried across the three steps, and the caller
    /// carries it.
    pub async fn copy_init(&self, src: &str, dst: &str) -> Result<CopyInit> {
        let account = self.pool.select().await?;
        let file = self.client.get_node(&account, src).await?;
        let token = self.client.initiate_upload(&account, &file, dst).await?;
        Ok(CopyInit { file, token })
    }

    /// Step two: stream the source bytes into the upload slot.
    pub async fn copy_exec(&self, src: &str, token: &str) -> Result<reqwest::Response> {
        let account = self.pool.select().await?;
        let source = self.client.download(&account, src, None).await?;
        self.client.relay_upload(source, token).await
    }

    /// Step three: poll the slot.
    pub async fn copy_stat(&self, token: &str) -> Result<UploadPoll> {
        self.client.poll_upload(token).await
    }
}
