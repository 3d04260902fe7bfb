//! Command-line arguments and configuration assembly.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stayhub_core::catalog::{
    AMENITY, IMAGE, NEAR_BY, PROPERTY, RATING, RATING_CONVERSATION, STAY_PLAN,
};
use stayhub_core::{CascadeConfig, DeleteBehavior, EngineConfig, Principal};

/// Default data directory.
pub const DEFAULT_DATA_PATH: &str = "./data";

/// Resolved CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Path to the sled database directory.
    pub data_path: PathBuf,
    /// Caller identity for every operation.
    pub principal: Principal,
    /// Engine settings.
    pub engine: EngineConfig,
}

impl CliConfig {
    /// Create a configuration with the given data path.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            principal: Principal::Anonymous,
            engine: EngineConfig::default(),
        }
    }

    /// Act as an identified principal.
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = principal;
        self
    }

    /// Set the engine configuration.
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_PATH)
    }
}

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "stayhub")]
#[command(version, about = "Stayhub listing directory", long_about = None)]
pub struct Args {
    /// Path to the database storage directory.
    #[arg(short, long, global = true, default_value = DEFAULT_DATA_PATH)]
    pub data_path: PathBuf,

    /// Act as this user id (anonymous when omitted).
    #[arg(long = "as", value_name = "USER", global = true)]
    pub principal: Option<String>,

    /// Recompute rating summaries before each command returns.
    #[arg(long, global = true)]
    pub inline_ratings: bool,

    /// Refuse to delete properties and ratings that still have children.
    #[arg(long, global = true, conflicts_with = "cascade_ratings")]
    pub restrict_children: bool,

    /// Delete a property's ratings along with it.
    #[arg(long, global = true)]
    pub cascade_ratings: bool,

    /// User ids allowed to manage the platform lookup tables.
    #[arg(long = "platform-owner", value_name = "USER", global = true)]
    pub platform_owners: Vec<String>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Entity commands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Create a record from a JSON object.
    Create {
        /// Entity name.
        entity: String,
        /// Record JSON.
        json: String,
    },
    /// Read a record.
    Get {
        /// Entity name.
        entity: String,
        /// Record id.
        id: String,
    },
    /// Patch a record with a JSON object; null clears a field.
    Update {
        /// Entity name.
        entity: String,
        /// Record id.
        id: String,
        /// Patch JSON.
        json: String,
    },
    /// Delete a record and apply the cascade policy.
    Delete {
        /// Entity name.
        entity: String,
        /// Record id.
        id: String,
    },
    /// List records of an entity.
    List {
        /// Entity name.
        entity: String,
        /// Equality filter, `field=value`.
        #[arg(long = "where", value_name = "FIELD=VALUE")]
        filters: Vec<String>,
        /// Cursor from a previous page.
        #[arg(long)]
        cursor: Option<String>,
        /// Page size.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Search properties.
    Properties {
        /// Lower bound of the price range.
        #[arg(long)]
        min_price: Option<i64>,
        /// Upper bound of the price range.
        #[arg(long)]
        max_price: Option<i64>,
        /// Latitude of the search centre.
        #[arg(long, allow_negative_numbers = true, requires_all = ["lng", "radius_km"])]
        lat: Option<f64>,
        /// Longitude of the search centre.
        #[arg(long, allow_negative_numbers = true, requires = "lat")]
        lng: Option<f64>,
        /// Search radius in kilometres.
        #[arg(long, requires = "lat")]
        radius_km: Option<f64>,
        /// Minimum rating.
        #[arg(long)]
        min_rating: Option<f64>,
        /// Required amenity name (repeatable).
        #[arg(long = "amenity", value_name = "NAME")]
        amenities: Vec<String>,
        /// Cursor from a previous page.
        #[arg(long)]
        cursor: Option<String>,
        /// Page size.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Recompute a property's rating summary.
    Recompute {
        /// Property id.
        prop_id: String,
    },
    /// Show an entity's fields and relations.
    Describe {
        /// Entity name.
        entity: String,
    },
}

impl Args {
    /// Split arguments into the resolved configuration and the command.
    pub fn into_config(self) -> (CliConfig, Command) {
        let mut engine = EngineConfig::new();
        if self.inline_ratings {
            engine = engine.inline_aggregation();
        }
        for owner in self.platform_owners {
            engine = engine.with_platform_owner(owner);
        }

        let mut cascade = CascadeConfig::new();
        if self.restrict_children {
            for child in [AMENITY, IMAGE, NEAR_BY, STAY_PLAN] {
                cascade = cascade.with_policy(PROPERTY, child, DeleteBehavior::Restrict);
            }
            cascade = cascade.with_policy(RATING, RATING_CONVERSATION, DeleteBehavior::Restrict);
        }
        if self.cascade_ratings {
            cascade = cascade.with_policy(PROPERTY, RATING, DeleteBehavior::Cascade);
        }
        engine = engine.with_cascade(cascade);

        let principal = match self.principal {
            Some(id) => Principal::identified(id),
            None => Principal::Anonymous,
        };

        let config = CliConfig::new(self.data_path)
            .with_principal(principal)
            .with_engine(engine);
        (config, self.command)
    }
}
