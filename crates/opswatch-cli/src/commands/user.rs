//! User management command implementation.

use std::io::Write;

use opswatch_client::{
    CacheKey, MutationPipeline, NewUser, Repository, SyncCache, UserId, UserPatch,
};

use crate::cli::{CreateUserArgs, UpdateUserArgs, UserCommands};
use crate::commands::{filter, load};
use crate::error::CliError;
use crate::output::{ActionResponse, Freshness, OutputFormat, UserList};

/// Handler for user subcommands.
pub struct UserCommand<'a, R> {
    cache: &'a SyncCache<R>,
}

impl<'a, R: Repository> UserCommand<'a, R> {
    /// Creates a new user command handler.
    #[must_use]
    pub const fn new(cache: &'a SyncCache<R>) -> Self {
        Self { cache }
    }

    /// Executes the user subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &UserCommands,
    ) -> Result<(), CliError> {
        match command {
            UserCommands::List { search } => self.list(out, format, search.as_deref()).await,
            UserCommands::Create(args) => self.create(out, format, args).await,
            UserCommands::Update(args) => self.update(out, format, args).await,
            UserCommands::Delete { id } => self.delete(out, format, id).await,
        }
    }

    async fn list<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        search: Option<&str>,
    ) -> Result<(), CliError> {
        let state = load(self.cache, CacheKey::Users).await?;
        let users = self.cache.users().data.unwrap_or_default();

        let list = UserList {
            users: filter(&users, search),
            freshness: Freshness::from(&state),
        };
        format.write(out, &list)
    }

    async fn create<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &CreateUserArgs,
    ) -> Result<(), CliError> {
        let new = NewUser {
            name: args.name.clone(),
            email: args.email.clone(),
            phone: args.phone.clone(),
            role: args.role.clone(),
        };
        let created = MutationPipeline::new(self.cache.clone())
            .create_user(new)
            .await?;

        let response = ActionResponse::new(
            format!("User '{}' created with id {}", created.name, created.id),
            Some(created),
        );
        format.write(out, &response)
    }

    async fn update<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &UpdateUserArgs,
    ) -> Result<(), CliError> {
        let patch = UserPatch {
            name: args.name.clone(),
            email: args.email.clone(),
            phone: args.phone.clone(),
            role: args.role.clone(),
        };
        if patch == UserPatch::default() {
            return Err(CliError::InvalidArgument(
                "nothing to update, pass at least one of --name, --email, --phone, --role".into(),
            ));
        }

        let updated = MutationPipeline::new(self.cache.clone())
            .update_user(UserId::from(args.id.as_str()), patch)
            .await?;

        let response = ActionResponse::new(format!("User {} updated", updated.id), Some(updated));
        format.write(out, &response)
    }

    async fn delete<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        id: &str,
    ) -> Result<(), CliError> {
        let id = UserId::from(id);
        MutationPipeline::new(self.cache.clone())
            .delete_user(id.clone())
            .await?;

        let response: ActionResponse<()> = ActionResponse::new(format!("User {id} deleted"), None);
        format.write(out, &response)
    }
}
