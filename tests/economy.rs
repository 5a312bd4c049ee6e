use economy_service::Registry;
use economy_service::config::Config;
use economy_service::db::DbResult;
use economy_service::db::error::DbError;
use economy_service::db::repo::StorageRepo;
use economy_service::error::ErrorCode;
use economy_service::models::currency::NewCurrency;
use economy_service::models::item::{Item, NewItem, StackBalancingMethod};
use economy_service::models::page::{PageRequest, PageWindow};
use economy_service::models::player::NewPlayer;
use economy_service::models::shop::NewShop;
use economy_service::models::storage::{NewStorage, Storage, StorageSummary};
use economy_service::models::types::{EntityPatch, ItemId, Metadata, StorageId, StorageItemId};
use economy_service::services::StorageService;
use economy_service::stacking::{ChangeSet, SplitSpec, StorageChange};
use economy_service::util::random::{GrantAmount, RandomSource, SeededRandom};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Always answers with the same value, clamped into the requested range.
struct Fixed(i64);

impl RandomSource for Fixed {
    fn int_inclusive(&self, min: i64, max: i64) -> i64 {
        self.0.clamp(min, max)
    }
}

fn registry() -> Registry {
    Registry::in_memory_with(Arc::new(Config::in_memory()), Arc::new(SeededRandom::new(1)))
}

async fn new_storage(reg: &Registry, name: &str) -> Storage {
    let player = reg
        .services
        .player
        .create(NewPlayer {
            name: format!("{name}-owner"),
            metadata: Metadata::default(),
        })
        .await
        .unwrap();
    reg.services
        .storage
        .create(&player.id.to_string(), name, Metadata::default())
        .await
        .unwrap()
}

async fn new_item(reg: &Registry, name: &str, stackable: bool, max: i64, method: StackBalancingMethod) -> Item {
    reg.services
        .item
        .create(NewItem {
            name: name.to_string(),
            stackable,
            stack_max_amount: max,
            stack_balancing_method: method,
            metadata: Metadata::default(),
        })
        .await
        .unwrap()
}

async fn new_currency(reg: &Registry, name: &str) -> String {
    reg.services
        .currency
        .create(NewCurrency {
            name: name.to_string(),
            short_name: name.to_uppercase(),
            symbol: name[..1].to_string(),
        })
        .await
        .unwrap()
        .id
        .to_string()
}

async fn reload(reg: &Registry, storage: &Storage) -> Storage {
    reg.services.storage.get(&storage.id.to_string()).await.unwrap()
}

/// Stack amounts of an item, smallest first.
fn amounts(storage: &Storage, item_id: ItemId) -> Vec<i64> {
    let mut v: Vec<i64> = storage.stacks_of(item_id).map(|s| s.amount).collect();
    v.sort();
    v
}

#[tokio::test]
async fn non_stackable_grant_creates_one_row_per_unit() {
    let reg = registry();
    let storage = new_storage(&reg, "bag").await;
    let sword = new_item(&reg, "sword", false, 0, StackBalancingMethod::Default).await;

    let grant = reg
        .services
        .storage
        .give_item(&storage.id.to_string(), &sword.id.to_string(), 3.into(), None)
        .await
        .unwrap();
    assert_eq!(grant.amount_granted, 3);

    let storage = reload(&reg, &storage).await;
    assert_eq!(amounts(&storage, sword.id), vec![1, 1, 1]);
    assert_eq!(storage.units_of(sword.id), 3);
}

#[tokio::test]
async fn create_new_stacks_never_tops_up() {
    let reg = registry();
    let storage = new_storage(&reg, "bag").await;
    let gold = new_item(&reg, "gold", true, 100, StackBalancingMethod::UnbalancedCreateNewStacks).await;

    for _ in 0..2 {
        reg.services
            .storage
            .give_item(&storage.id.to_string(), &gold.id.to_string(), 60.into(), None)
            .await
            .unwrap();
    }

    let storage = reload(&reg, &storage).await;
    assert_eq!(amounts(&storage, gold.id), vec![60, 60]);
}

#[tokio::test]
async fn balanced_fill_tops_up_then_creates() {
    let reg = registry();
    let storage = new_storage(&reg, "bag").await;
    let gold = new_item(&reg, "gold", true, 100, StackBalancingMethod::BalancedFillExistingStacks).await;
    let (sid, iid) = (storage.id.to_string(), gold.id.to_string());

    reg.services.storage.give_item(&sid, &iid, 80.into(), None).await.unwrap();
    reg.services.storage.give_item(&sid, &iid, 50.into(), None).await.unwrap();

    let storage = reload(&reg, &storage).await;
    assert_eq!(amounts(&storage, gold.id), vec![30, 100]);
}

#[tokio::test]
async fn grants_are_exact_and_respect_capacity_for_every_policy() {
    let methods = [
        StackBalancingMethod::Default,
        StackBalancingMethod::UnbalancedCreateNewStacks,
        StackBalancingMethod::UnbalancedFillExistingStacks,
        StackBalancingMethod::BalancedFillExistingStacks,
    ];

    for method in methods {
        let reg = registry();
        let storage = new_storage(&reg, "bag").await;
        let ore = new_item(&reg, "ore", true, 10, method).await;
        let (sid, iid) = (storage.id.to_string(), ore.id.to_string());

        reg.services.storage.give_item(&sid, &iid, 7.into(), None).await.unwrap();
        reg.services.storage.give_item(&sid, &iid, 25.into(), None).await.unwrap();

        let storage = reload(&reg, &storage).await;
        assert_eq!(storage.units_of(ore.id), 32, "{method}");
        assert!(storage.stacks_of(ore.id).all(|s| s.amount > 0 && s.amount <= 10), "{method}");
    }
}

#[tokio::test]
async fn zero_grant_is_a_noop_and_negative_is_rejected() {
    let reg = registry();
    let storage = new_storage(&reg, "bag").await;
    let ore = new_item(&reg, "ore", true, 10, StackBalancingMethod::Default).await;
    let (sid, iid) = (storage.id.to_string(), ore.id.to_string());

    let grant = reg.services.storage.give_item(&sid, &iid, 0.into(), None).await.unwrap();
    assert_eq!(grant.amount_granted, 0);
    assert!(reload(&reg, &storage).await.items.is_empty());

    let err = reg.services.storage.give_item(&sid, &iid, (-1).into(), None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[tokio::test]
async fn random_grant_uses_injected_source() {
    let reg = Registry::in_memory_with(Arc::new(Config::in_memory()), Arc::new(Fixed(4)));
    let storage = new_storage(&reg, "bag").await;
    let ore = new_item(&reg, "ore", true, 0, StackBalancingMethod::UnbalancedFillExistingStacks).await;

    let grant = reg
        .services
        .storage
        .give_item(
            &storage.id.to_string(),
            &ore.id.to_string(),
            GrantAmount::Range { min: 1, max: 6 },
            None,
        )
        .await
        .unwrap();
    assert_eq!(grant.amount_granted, 4);
    assert_eq!(reload(&reg, &storage).await.units_of(ore.id), 4);
}

#[tokio::test]
async fn give_currency_accumulates_one_balance() {
    let reg = registry();
    let storage = new_storage(&reg, "wallet").await;
    let gold = new_currency(&reg, "gold").await;
    let sid = storage.id.to_string();

    let first = reg.services.storage.give_currency(&sid, &gold, 15.into()).await.unwrap();
    let second = reg.services.storage.give_currency(&sid, &gold, 5.into()).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.amount, 20);
    assert_eq!(reload(&reg, &storage).await.currencies.len(), 1);
}

struct Shopfront {
    product: String,
    price: String,
    potion: Item,
    gold: String,
    gem: String,
}

/// Product rewarding 2 potions and 5 gems for a price of 10 gold.
async fn shopfront(reg: &Registry) -> Shopfront {
    let potion = new_item(reg, "potion", true, 0, StackBalancingMethod::UnbalancedFillExistingStacks).await;
    let gold = new_currency(reg, "gold").await;
    let gem = new_currency(reg, "gem").await;

    let product = reg.services.product.create("starter pack").await.unwrap();
    let pid = product.id.to_string();
    reg.services.product.attach_item(&pid, &potion.id.to_string(), 2).await.unwrap();
    reg.services.product.attach_currency(&pid, &gem, 5).await.unwrap();

    let price = reg.services.price.create(&pid).await.unwrap();
    let price_id = price.id.to_string();
    reg.services.price.attach_currency(&price_id, &gold, 10).await.unwrap();

    Shopfront {
        product: pid,
        price: price_id,
        potion,
        gold,
        gem,
    }
}

#[tokio::test]
async fn buying_with_exact_funds_drains_balance_and_delivers_rewards() {
    let reg = registry();
    let shop = shopfront(&reg).await;
    let paying = new_storage(&reg, "wallet").await;
    let receiving = new_storage(&reg, "bag").await;
    reg.services
        .storage
        .give_currency(&paying.id.to_string(), &shop.gold, 10.into())
        .await
        .unwrap();

    reg.services
        .product
        .buy(&shop.product, &shop.price, &paying.id.to_string(), &receiving.id.to_string())
        .await
        .unwrap();

    let paying = reload(&reg, &paying).await;
    assert_eq!(paying.currencies.len(), 1);
    assert_eq!(paying.currencies[0].amount, 0);

    let receiving = reload(&reg, &receiving).await;
    assert_eq!(receiving.units_of(shop.potion.id), 2);
    assert_eq!(receiving.currencies.len(), 1);
    assert_eq!(receiving.currencies[0].currency.id.to_string(), shop.gem);
    assert_eq!(receiving.currencies[0].amount, 5);
}

#[tokio::test]
async fn unaffordable_purchase_changes_nothing() {
    let reg = registry();
    let shop = shopfront(&reg).await;
    let paying = new_storage(&reg, "wallet").await;
    let receiving = new_storage(&reg, "bag").await;
    reg.services
        .storage
        .give_currency(&paying.id.to_string(), &shop.gold, 9.into())
        .await
        .unwrap();

    let paying_before = reload(&reg, &paying).await;
    let receiving_before = reload(&reg, &receiving).await;

    let err = reg
        .services
        .product
        .buy(&shop.product, &shop.price, &paying.id.to_string(), &receiving.id.to_string())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Aborted);

    assert_eq!(reload(&reg, &paying).await, paying_before);
    assert_eq!(reload(&reg, &receiving).await, receiving_before);
}

#[tokio::test]
async fn price_of_another_product_is_not_found() {
    let reg = registry();
    let shop = shopfront(&reg).await;
    let other = reg.services.product.create("other").await.unwrap();
    let paying = new_storage(&reg, "wallet").await;
    let sid = paying.id.to_string();

    let err = reg
        .services
        .product
        .buy(&other.id.to_string(), &shop.price, &sid, &sid)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn deleted_price_can_no_longer_be_used() {
    let reg = registry();
    let shop = shopfront(&reg).await;
    let paying = new_storage(&reg, "wallet").await;
    let sid = paying.id.to_string();
    reg.services.storage.give_currency(&sid, &shop.gold, 10.into()).await.unwrap();

    reg.services.price.delete(&shop.price).await.unwrap();
    assert!(reg.services.product.list_prices(&shop.product).await.unwrap().is_empty());

    let err = reg
        .services
        .product
        .buy(&shop.product, &shop.price, &sid, &sid)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn same_storage_purchase_credits_after_debits() {
    let reg = registry();
    let shop = shopfront(&reg).await;
    let storage = new_storage(&reg, "bag").await;
    let sid = storage.id.to_string();
    let potion = shop.potion.id.to_string();

    // pay 2 potions on top of the gold, so the only potion stack is consumed
    reg.services.price.attach_item(&shop.price, &potion, 2).await.unwrap();
    reg.services.storage.give_currency(&sid, &shop.gold, 10.into()).await.unwrap();
    reg.services.storage.give_item(&sid, &potion, 2.into(), None).await.unwrap();

    let paid_stack = reload(&reg, &storage).await.items[0].id;

    reg.services.product.buy(&shop.product, &shop.price, &sid, &sid).await.unwrap();

    let storage = reload(&reg, &storage).await;
    assert_eq!(amounts(&storage, shop.potion.id), vec![2]);
    assert!(storage.stack(paid_stack).is_none());
    let gold = storage
        .currencies
        .iter()
        .find(|c| c.currency.id.to_string() == shop.gold)
        .unwrap();
    assert_eq!(gold.amount, 0);
}

#[tokio::test]
async fn split_with_wrong_sum_leaves_storage_untouched() {
    let reg = registry();
    let storage = new_storage(&reg, "bag").await;
    let ore = new_item(&reg, "ore", true, 0, StackBalancingMethod::Default).await;
    let sid = storage.id.to_string();
    reg.services.storage.give_item(&sid, &ore.id.to_string(), 6.into(), None).await.unwrap();

    let before = reload(&reg, &storage).await;
    let stack = before.items[0].id.to_string();

    let err = reg
        .services
        .storage
        .split_stack(&sid, &stack, SplitSpec::Amounts(vec![3, 4]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Aborted);
    assert_eq!(reload(&reg, &storage).await, before);
}

#[tokio::test]
async fn split_then_merge_restores_the_amount() {
    let reg = registry();
    let storage = new_storage(&reg, "bag").await;
    let ore = new_item(&reg, "ore", true, 0, StackBalancingMethod::Default).await;
    let sid = storage.id.to_string();
    reg.services.storage.give_item(&sid, &ore.id.to_string(), 6.into(), None).await.unwrap();
    let stack = reload(&reg, &storage).await.items[0].id.to_string();

    let split = reg
        .services
        .storage
        .split_stack(&sid, &stack, SplitSpec::Amounts(vec![2, 4]))
        .await
        .unwrap();
    assert_eq!(amounts(&split, ore.id), vec![2, 4]);

    let to = split.items[0].id.to_string();
    let from = split.items[1].id.to_string();
    let merged = reg.services.storage.merge_stack(&to, &from).await.unwrap();
    assert_eq!(amounts(&merged, ore.id), vec![6]);
    assert_eq!(merged.items[0].id, split.items[0].id);
}

#[tokio::test]
async fn merge_over_capacity_is_rejected() {
    let reg = registry();
    let storage = new_storage(&reg, "bag").await;
    let ore = new_item(&reg, "ore", true, 10, StackBalancingMethod::UnbalancedCreateNewStacks).await;
    let (sid, iid) = (storage.id.to_string(), ore.id.to_string());
    reg.services.storage.give_item(&sid, &iid, 7.into(), None).await.unwrap();
    reg.services.storage.give_item(&sid, &iid, 5.into(), None).await.unwrap();

    let before = reload(&reg, &storage).await;
    let err = reg
        .services
        .storage
        .merge_stack(&before.items[0].id.to_string(), &before.items[1].id.to_string())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Aborted);
    assert_eq!(reload(&reg, &storage).await, before);
}

#[tokio::test]
async fn merge_across_storages_is_rejected() {
    let reg = registry();
    let a = new_storage(&reg, "a").await;
    let b = new_storage(&reg, "b").await;
    let ore = new_item(&reg, "ore", true, 0, StackBalancingMethod::Default).await;
    let iid = ore.id.to_string();
    reg.services.storage.give_item(&a.id.to_string(), &iid, 1.into(), None).await.unwrap();
    reg.services.storage.give_item(&b.id.to_string(), &iid, 1.into(), None).await.unwrap();

    let to = reload(&reg, &a).await.items[0].id.to_string();
    let from = reload(&reg, &b).await.items[0].id.to_string();
    let err = reg.services.storage.merge_stack(&to, &from).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Aborted);
}

#[tokio::test]
async fn stale_guard_fails_the_whole_change_set() {
    let reg = registry();
    let storage = new_storage(&reg, "wallet").await;
    let gold = new_currency(&reg, "gold").await;
    let balance = reg
        .services
        .storage
        .give_currency(&storage.id.to_string(), &gold, 10.into())
        .await
        .unwrap();

    let mut set = ChangeSet::new();
    set.lock(storage.id).extend([
        StorageChange::TakeCurrency {
            id: balance.id,
            expected: 10,
            amount: 4,
        },
        StorageChange::TakeCurrency {
            id: balance.id,
            expected: 10,
            amount: 1,
        },
    ]);
    let err = reg.repos.storage.apply(set).await.unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));

    let storage = reload(&reg, &storage).await;
    assert_eq!(storage.currencies[0].amount, 10);
}

#[tokio::test]
async fn empty_ids_are_invalid_arguments() {
    let reg = registry();
    let s = &reg.services;

    assert_eq!(s.storage.get("").await.unwrap_err().code(), ErrorCode::InvalidArgument);
    assert_eq!(s.item.get(" ").await.unwrap_err().code(), ErrorCode::InvalidArgument);
    assert_eq!(s.shop.get("").await.unwrap_err().code(), ErrorCode::InvalidArgument);
    let err = s.product.buy("", "", "", "").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert_eq!(err.to_string(), "invalid argument: no product_id given");
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let reg = registry();
    let missing = ItemId::new().to_string();

    assert_eq!(reg.services.item.get(&missing).await.unwrap_err().code(), ErrorCode::NotFound);
    assert_eq!(reg.services.storage.get(&missing).await.unwrap_err().code(), ErrorCode::NotFound);
    assert_eq!(reg.services.player.get(&missing).await.unwrap_err().code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn listing_pages_through_all_items() {
    let reg = registry();
    for i in 0..5 {
        new_item(&reg, &format!("item-{i}"), true, 0, StackBalancingMethod::Default).await;
    }

    let first = reg.services.item.list(&PageRequest::first(2)).await.unwrap();
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.total_size, 5);
    assert_eq!(first.next_page_token.as_deref(), Some("1"));

    let last = reg.services.item.list(&PageRequest::new(2, "2")).await.unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.next_page_token, None);

    let mut seen: Vec<ItemId> = Vec::new();
    let mut token = String::new();
    loop {
        let page = reg.services.item.list(&PageRequest::new(2, token.clone())).await.unwrap();
        seen.extend(page.items.iter().map(|i| i.id));
        match page.next_page_token {
            Some(next) => token = next,
            None => break,
        }
    }
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 5);
}

#[tokio::test]
async fn search_matches_names_case_insensitively() {
    let reg = registry();
    new_item(&reg, "Iron Sword", false, 0, StackBalancingMethod::Default).await;
    new_item(&reg, "iron ore", true, 0, StackBalancingMethod::Default).await;
    new_item(&reg, "gold", true, 0, StackBalancingMethod::Default).await;

    let page = reg.services.item.search("^iron", &PageRequest::default()).await.unwrap();
    assert_eq!(page.total_size, 2);

    let err = reg.services.item.search("(", &PageRequest::default()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[tokio::test]
async fn shop_lists_attached_products() {
    let reg = registry();
    let sf = shopfront(&reg).await;
    let shop = reg
        .services
        .shop
        .create(NewShop {
            name: "general store".to_string(),
            metadata: Metadata::default(),
        })
        .await
        .unwrap();
    let shop_id = shop.id.to_string();

    let shop = reg.services.shop.attach_product(&shop_id, &sf.product).await.unwrap();
    assert_eq!(shop.products.len(), 1);
    let offered = &shop.products[0].product;
    assert_eq!(offered.id.to_string(), sf.product);
    assert_eq!(offered.prices.len(), 1);
    assert_eq!(offered.items.len(), 1);

    let shop = reg
        .services
        .shop
        .detach_product(&shop.products[0].id.to_string())
        .await
        .unwrap();
    assert!(shop.products.is_empty());
}

#[tokio::test]
async fn player_lists_owned_storages() {
    let reg = registry();
    let storage = new_storage(&reg, "bank").await;

    let player = reg.services.player.get(&storage.player_id.to_string()).await.unwrap();
    assert_eq!(player.storages.len(), 1);
    assert_eq!(player.storages[0].id, storage.id);
    assert_eq!(player.storages[0].name, "bank");
}

#[tokio::test]
async fn huge_page_token_lists_nothing() {
    let reg = registry();
    new_item(&reg, "ore", true, 0, StackBalancingMethod::Default).await;

    let page = reg
        .services
        .item
        .list(&PageRequest::new(10, "9223372036854775807"))
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_size, 1);
    assert_eq!(page.next_page_token, None);
}

#[tokio::test]
async fn oversized_grants_are_rejected_before_planning() {
    let reg = registry();
    let storage = new_storage(&reg, "bag").await;
    let sword = new_item(&reg, "sword", false, 0, StackBalancingMethod::Default).await;
    let (sid, iid) = (storage.id.to_string(), sword.id.to_string());

    let err = reg
        .services
        .storage
        .give_item(&sid, &iid, (1i64 << 62).into(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert!(reload(&reg, &storage).await.items.is_empty());

    let product = reg.services.product.create("armoury").await.unwrap();
    let err = reg
        .services
        .product
        .attach_item(&product.id.to_string(), &iid, 1 << 40)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[tokio::test]
async fn new_stacks_carry_grant_metadata() {
    let reg = registry();
    let storage = new_storage(&reg, "bag").await;
    let ore = new_item(&reg, "ore", true, 10, StackBalancingMethod::BalancedFillExistingStacks).await;
    let (sid, iid) = (storage.id.to_string(), ore.id.to_string());

    reg.services.storage.give_item(&sid, &iid, 8.into(), None).await.unwrap();
    let tagged = Metadata::parse(r#"{"source":"quest"}"#).unwrap();
    reg.services
        .storage
        .give_item(&sid, &iid, 5.into(), Some(tagged.clone()))
        .await
        .unwrap();

    let mut stacks: Vec<_> = reload(&reg, &storage).await.items;
    stacks.sort_by_key(|s| s.amount);
    assert_eq!(stacks[0].amount, 3);
    assert_eq!(stacks[0].metadata, tagged);
    assert_eq!(stacks[1].amount, 10);
    assert_eq!(stacks[1].metadata, Metadata::default());
}

#[tokio::test]
async fn config_values_round_trip_and_page_by_key() {
    let reg = registry();
    let config = &reg.services.config;

    assert_eq!(config.get("motd").await.unwrap_err().code(), ErrorCode::NotFound);
    assert_eq!(config.set(" ", "x").await.unwrap_err().code(), ErrorCode::InvalidArgument);

    config.set("motd", "welcome").await.unwrap();
    config.set("motd", "welcome back").await.unwrap();
    config.set("banner", "sale").await.unwrap();
    config.set("tax", "5").await.unwrap();
    assert_eq!(config.get("motd").await.unwrap().value, "welcome back");

    let first = config.list(&PageRequest::first(2)).await.unwrap();
    assert_eq!(first.total_size, 3);
    let keys: Vec<&str> = first.items.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, ["banner", "motd"]);
    assert_eq!(first.next_page_token.as_deref(), Some("1"));

    let rest = config.list(&PageRequest::new(2, "1")).await.unwrap();
    assert_eq!(rest.items.len(), 1);
    assert_eq!(rest.items[0].key, "tax");
    assert_eq!(rest.next_page_token, None);
}

/// Storage repository that lets a queued competing writer commit right
/// before each `apply`, the way a concurrent request would.
struct Racing {
    inner: Arc<dyn StorageRepo>,
    rivals: Mutex<VecDeque<ChangeSet>>,
}

impl Racing {
    fn new(inner: Arc<dyn StorageRepo>, rivals: impl IntoIterator<Item = ChangeSet>) -> Self {
        Self {
            inner,
            rivals: Mutex::new(rivals.into_iter().collect()),
        }
    }
}

#[async_trait::async_trait]
impl StorageRepo for Racing {
    async fn create(&self, new: NewStorage) -> DbResult<Storage> {
        self.inner.create(new).await
    }

    async fn update(&self, id: StorageId, patch: EntityPatch) -> DbResult<Storage> {
        self.inner.update(id, patch).await
    }

    async fn get(&self, id: StorageId) -> DbResult<Option<Storage>> {
        self.inner.get(id).await
    }

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<StorageSummary>, i64)> {
        self.inner.list(window).await
    }

    async fn storage_of_stack(&self, id: StorageItemId) -> DbResult<Option<StorageId>> {
        self.inner.storage_of_stack(id).await
    }

    async fn apply(&self, set: ChangeSet) -> DbResult<()> {
        let rival = self.rivals.lock().pop_front();
        if let Some(rival) = rival {
            self.inner.apply(rival).await?;
        }
        self.inner.apply(set).await
    }
}

fn racing_storage_service(reg: &Registry, racing: Arc<Racing>) -> StorageService {
    StorageService::new(
        racing,
        reg.repos.player.clone(),
        reg.repos.item.clone(),
        reg.repos.currency.clone(),
        Arc::new(Fixed(0)),
        100,
    )
}

fn top_up(storage: StorageId, stack: StorageItemId, expected: i64) -> ChangeSet {
    let mut set = ChangeSet::new();
    set.lock(storage)
        .extend([StorageChange::FillStack { id: stack, expected, add: 1 }]);
    set
}

#[tokio::test]
async fn grant_losing_a_race_is_replanned() {
    let reg = registry();
    let storage = new_storage(&reg, "bag").await;
    let ore = new_item(&reg, "ore", true, 100, StackBalancingMethod::BalancedFillExistingStacks).await;
    let (sid, iid) = (storage.id.to_string(), ore.id.to_string());
    reg.services.storage.give_item(&sid, &iid, 80.into(), None).await.unwrap();
    let stack = reload(&reg, &storage).await.items[0].id;

    let racing = Arc::new(Racing::new(reg.repos.storage.clone(), [top_up(storage.id, stack, 80)]));
    let service = racing_storage_service(&reg, racing.clone());
    service.give_item(&sid, &iid, 50.into(), None).await.unwrap();

    assert!(racing.rivals.lock().is_empty());
    let storage = reload(&reg, &storage).await;
    assert_eq!(amounts(&storage, ore.id), vec![31, 100]);
}

#[tokio::test]
async fn split_that_keeps_losing_races_is_aborted() {
    let reg = registry();
    let storage = new_storage(&reg, "bag").await;
    let ore = new_item(&reg, "ore", true, 0, StackBalancingMethod::Default).await;
    let sid = storage.id.to_string();
    reg.services.storage.give_item(&sid, &ore.id.to_string(), 6.into(), None).await.unwrap();
    let stack = reload(&reg, &storage).await.items[0].id;

    let rivals = (6..9).map(|expected| top_up(storage.id, stack, expected));
    let racing = Arc::new(Racing::new(reg.repos.storage.clone(), rivals));
    let service = racing_storage_service(&reg, racing);

    let err = service
        .split_stack(&sid, &stack.to_string(), SplitSpec::FixedAmount(2))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Aborted);
    assert_eq!(amounts(&reload(&reg, &storage).await, ore.id), vec![9]);
}

#[tokio::test]
async fn merge_losing_a_race_is_replanned() {
    let reg = registry();
    let storage = new_storage(&reg, "bag").await;
    let ore = new_item(&reg, "ore", true, 0, StackBalancingMethod::UnbalancedCreateNewStacks).await;
    let (sid, iid) = (storage.id.to_string(), ore.id.to_string());
    reg.services.storage.give_item(&sid, &iid, 4.into(), None).await.unwrap();
    reg.services.storage.give_item(&sid, &iid, 3.into(), None).await.unwrap();
    let before = reload(&reg, &storage).await;
    let (to, from) = (before.items[0].clone(), before.items[1].clone());

    let racing = Arc::new(Racing::new(
        reg.repos.storage.clone(),
        [top_up(storage.id, from.id, from.amount)],
    ));
    let service = racing_storage_service(&reg, racing);
    let merged = service.merge_stack(&to.id.to_string(), &from.id.to_string()).await.unwrap();

    assert_eq!(amounts(&merged, ore.id), vec![8]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_purchases_spend_one_wallet_once() {
    let reg = Arc::new(registry());
    let shop = shopfront(&reg).await;
    let paying = new_storage(&reg, "wallet").await;
    let receiving = new_storage(&reg, "bag").await;
    reg.services
        .storage
        .give_currency(&paying.id.to_string(), &shop.gold, 10.into())
        .await
        .unwrap();

    let buy = |reg: Arc<Registry>| {
        let (product, price) = (shop.product.clone(), shop.price.clone());
        let (paying, receiving) = (paying.id.to_string(), receiving.id.to_string());
        tokio::spawn(async move {
            reg.services
                .product
                .buy(&product, &price, &paying, &receiving)
                .await
                .map(|_| ())
                .map_err(|e| e.code())
        })
    };
    let (a, b) = tokio::join!(buy(reg.clone()), buy(reg.clone()));
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let failure = outcomes.iter().find_map(|r| r.err()).unwrap();
    assert!(matches!(failure, ErrorCode::Aborted | ErrorCode::Internal));

    let paying = reload(&reg, &paying).await;
    assert_eq!(paying.currencies[0].amount, 0);
    let receiving = reload(&reg, &receiving).await;
    assert_eq!(receiving.units_of(shop.potion.id), 2);
    assert_eq!(receiving.currencies.len(), 1);
    assert_eq!(receiving.currencies[0].amount, 5);
}
