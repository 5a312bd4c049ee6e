use crate::config::Config;
use crate::db::Db;
use crate::db::mem::MemoryStore;
use crate::db::repo::{
    ConfigRepo, ConfigRepository, CurrencyRepo, CurrencyRepository, ItemRepo, ItemRepository, PlayerRepo, PlayerRepository, PriceRepo,
    PriceRepository, ProductRepo, ProductRepository, ShopRepo, ShopRepository, StorageRepo, StorageRepository,
};
use crate::error::InfraError;
use crate::services::{
    ConfigService, CurrencyService, ItemService, PlayerService, PriceService, ProductService, ShopService, StorageService,
};
use crate::util::random::{RandomSource, ThreadRandom};
use std::sync::Arc;

pub struct Repos {
    pub item: Arc<dyn ItemRepo>,
    pub currency: Arc<dyn CurrencyRepo>,
    pub player: Arc<dyn PlayerRepo>,
    pub storage: Arc<dyn StorageRepo>,
    pub product: Arc<dyn ProductRepo>,
    pub price: Arc<dyn PriceRepo>,
    pub shop: Arc<dyn ShopRepo>,
    pub config: Arc<dyn ConfigRepo>,
}

pub struct Services {
    pub item: Arc<ItemService>,
    pub currency: Arc<CurrencyService>,
    pub player: Arc<PlayerService>,
    pub storage: Arc<StorageService>,
    pub product: Arc<ProductService>,
    pub price: Arc<PriceService>,
    pub shop: Arc<ShopService>,
    pub config: Arc<ConfigService>,
}

pub struct Registry {
    /// `None` when running on the in-memory backend
    pub db: Option<Arc<Db>>,
    pub repos: Arc<Repos>,
    pub services: Arc<Services>,
    pub config: Arc<Config>,
}

impl Registry {
    pub fn new(db: Arc<Db>, config: Arc<Config>) -> Self {
        let repos = Repos {
            item: Arc::new(ItemRepository::new(db.clone())),
            currency: Arc::new(CurrencyRepository::new(db.clone())),
            player: Arc::new(PlayerRepository::new(db.clone())),
            storage: Arc::new(StorageRepository::new(db.clone())),
            product: Arc::new(ProductRepository::new(db.clone())),
            price: Arc::new(PriceRepository::new(db.clone())),
            shop: Arc::new(ShopRepository::new(db.clone())),
            config: Arc::new(ConfigRepository::new(db.clone())),
        };
        Self::assemble(Some(db), repos, config, Arc::new(ThreadRandom))
    }

    /// Registry backed by a fresh [`MemoryStore`].
    pub fn in_memory(config: Arc<Config>) -> Self {
        Self::in_memory_with(config, Arc::new(ThreadRandom))
    }

    /// Like [`Registry::in_memory`] with an explicit random source, so
    /// randomised grants are reproducible.
    pub fn in_memory_with(config: Arc<Config>, rng: Arc<dyn RandomSource>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let repos = Repos {
            item: store.clone(),
            currency: store.clone(),
            player: store.clone(),
            storage: store.clone(),
            product: store.clone(),
            price: store.clone(),
            shop: store.clone(),
            config: store,
        };
        Self::assemble(None, repos, config, rng)
    }

    /// Pick the backend from `config.database_url`. Postgres databases are
    /// migrated before the registry is handed out.
    pub async fn connect(config: Arc<Config>) -> Result<Self, InfraError> {
        if config.uses_memory_backend() {
            tracing::info!("using in-memory backend");
            return Ok(Self::in_memory(config));
        }

        let db = Arc::new(Db::new(&config.database_url, config.pool_max_size)?);
        db.init().await?;
        Ok(Self::new(db, config))
    }

    fn assemble(db: Option<Arc<Db>>, repos: Repos, config: Arc<Config>, rng: Arc<dyn RandomSource>) -> Self {
        let page_size = config.default_page_size;

        let services = Services {
            item: Arc::new(ItemService::new(repos.item.clone(), page_size)),
            currency: Arc::new(CurrencyService::new(repos.currency.clone(), page_size)),
            player: Arc::new(PlayerService::new(repos.player.clone(), page_size)),
            storage: Arc::new(StorageService::new(
                repos.storage.clone(),
                repos.player.clone(),
                repos.item.clone(),
                repos.currency.clone(),
                rng,
                page_size,
            )),
            product: Arc::new(ProductService::new(
                repos.product.clone(),
                repos.price.clone(),
                repos.storage.clone(),
                repos.item.clone(),
                repos.currency.clone(),
                page_size,
            )),
            price: Arc::new(PriceService::new(
                repos.price.clone(),
                repos.product.clone(),
                repos.item.clone(),
                repos.currency.clone(),
            )),
            shop: Arc::new(ShopService::new(repos.shop.clone(), repos.product.clone(), page_size)),
            config: Arc::new(ConfigService::new(repos.config.clone(), page_size)),
        };

        Self {
            db,
            repos: Arc::new(repos),
            services: Arc::new(services),
            config,
        }
    }
}
