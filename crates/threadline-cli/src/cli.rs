use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "threadline")]
#[command(version)]
#[command(about = "Read and write threaded comments from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account
    Signup {
        username: String,
        email: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign in with a username or email address
    Login {
        #[arg(value_name = "USERNAME_OR_EMAIL")]
        identifier: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
        /// Keep the session across restarts using the refresh token
        #[arg(long)]
        remember: bool,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Print the comment tree
    List,
    /// Post a top-level comment
    Post { text: String },
    /// Reply to a comment
    Reply {
        #[arg(value_name = "PARENT_ID")]
        parent_id: i64,
        text: String,
    },
    /// Delete one of your comments and every reply under it
    Delete {
        #[arg(value_name = "COMMENT_ID")]
        id: i64,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}
