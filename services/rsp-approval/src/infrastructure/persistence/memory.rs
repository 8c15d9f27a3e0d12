//! 进程内存储
//!
//! 用于测试和无数据库的本地运行。`begin` 独占整个存储并复制一份工作副本，
//! `commit` 写回，`rollback` 或直接丢弃则不留痕迹。

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use rsp_common::{PagedResult, Pagination};
use rsp_errors::{AppError, AppResult};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::pricing::{RateSet, SkuAttributes, SkuPricingInputs};
use crate::domain::reference::{CountryDetails, User};
use crate::domain::repositories::{
    ApprovalRequestRepository, CountryPrice, MasterPriceRepository, ReferenceDataRepository,
    RequestFilter,
};
use crate::domain::request::{ApprovalRequest, ApprovalRequestId, Role, TransitionGuard};
use crate::domain::unit_of_work::{UnitOfWork, UnitOfWorkFactory};

/// SKU 主数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkuMasterRecord {
    pub pcs_per_case: Decimal,
    pub case_per_ton: Decimal,
    pub cogs_usd: Decimal,
}

/// SKU × 国家 费率记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeSpendRecord {
    pub description: String,
    pub attributes: SkuAttributes,
    pub rates: RateSet,
    /// 小数形式
    pub tts: Decimal,
}

/// 存储内容
#[derive(Debug, Clone, Default)]
pub struct MemoryData {
    pub users: Vec<User>,
    pub countries: HashMap<String, CountryDetails>,
    pub currency_rates: HashMap<String, Decimal>,
    pub sku_master: HashMap<String, SkuMasterRecord>,
    /// 键为 (sku_code, country)
    pub trade_spend: BTreeMap<(String, String), TradeSpendRecord>,
    /// 键为 (country, sku_code)
    pub country_prices: HashMap<(String, String), CountryPrice>,
    pub requests: HashMap<ApprovalRequestId, ApprovalRequest>,
}

impl MemoryData {
    /// 本地演示数据
    pub fn demo() -> Self {
        let pct = |v: i64, scale: u32| Decimal::new(v, scale);
        let mut data = MemoryData::default();

        data.users = vec![
            User::new("Mona Marketing", "mona", Role::Marketing),
            User::new("Tariq Finance", "tariq", Role::TtsApprover),
            User::new("Carla Costing", "carla", Role::CogsApprover),
            User::new("Omar Qatar", "omar", Role::CdManager),
            User::new("Rana Regional", "rana", Role::Manager),
            User::new("Ada Admin", "ada", Role::Admin),
        ];
        data.countries.insert(
            "Qatar".to_string(),
            CountryDetails {
                country: "Qatar".to_string(),
                vat: pct(5, 2),
                cd_manager: Some("Omar Qatar".to_string()),
                db_manager: Some("Doha Distribution".to_string()),
                currency: "QAR".to_string(),
            },
        );
        data.currency_rates
            .insert("Qatar".to_string(), pct(364, 2));
        data.sku_master.insert(
            "SKU-1001".to_string(),
            SkuMasterRecord {
                pcs_per_case: Decimal::from(24),
                case_per_ton: Decimal::from(91),
                cogs_usd: Decimal::from(1000),
            },
        );
        data.trade_spend.insert(
            ("SKU-1001".to_string(), "Qatar".to_string()),
            TradeSpendRecord {
                description: "Orange Juice 250ml".to_string(),
                attributes: SkuAttributes::default(),
                rates: RateSet {
                    vat: pct(5, 2),
                    rm: pct(20, 2),
                    wsm: pct(10, 2),
                    dm: pct(8, 2),
                    duty: pct(5, 2),
                    clearing_charges: pct(2, 2),
                    bd: pct(1, 2),
                    cpp: pct(3, 2),
                },
                tts: pct(5, 2),
            },
        );
        data.country_prices.insert(
            ("Qatar".to_string(), "SKU-1001".to_string()),
            CountryPrice {
                bptt: Decimal::ZERO,
                cif: Decimal::ZERO,
                rsp_per_case: Decimal::ZERO,
            },
        );
        data
    }
}

type Working = Arc<StdMutex<MemoryData>>;

fn with_data<T>(working: &Working, f: impl FnOnce(&mut MemoryData) -> T) -> AppResult<T> {
    let mut data = working
        .lock()
        .map_err(|_| AppError::internal("Memory store poisoned"))?;
    Ok(f(&mut data))
}

/// 进程内存储，同时是 Unit of Work 工厂
#[derive(Clone, Default)]
pub struct InMemoryStore {
    data: Arc<Mutex<MemoryData>>,
}

impl InMemoryStore {
    pub fn new(data: MemoryData) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
        }
    }

    /// 已提交数据的副本
    pub async fn snapshot(&self) -> MemoryData {
        self.data.lock().await.clone()
    }
}

#[async_trait]
impl UnitOfWorkFactory for InMemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let committed = self.data.clone().lock_owned().await;
        let working = Arc::new(StdMutex::new((*committed).clone()));

        Ok(Box::new(InMemoryUnitOfWork {
            committed,
            requests: MemoryRequestRepository(working.clone()),
            reference: MemoryReferenceRepository(working.clone()),
            masters: MemoryMasterRepository(working.clone()),
            working,
        }))
    }
}

/// 进程内 Unit of Work
pub struct InMemoryUnitOfWork {
    committed: OwnedMutexGuard<MemoryData>,
    working: Working,
    requests: MemoryRequestRepository,
    reference: MemoryReferenceRepository,
    masters: MemoryMasterRepository,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    fn requests(&self) -> &dyn ApprovalRequestRepository {
        &self.requests
    }

    fn reference(&self) -> &dyn ReferenceDataRepository {
        &self.reference
    }

    fn masters(&self) -> &dyn MasterPriceRepository {
        &self.masters
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let mut this = *self;
        let data = with_data(&this.working, std::mem::take)?;
        *this.committed = data;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

struct MemoryRequestRepository(Working);
struct MemoryReferenceRepository(Working);
struct MemoryMasterRepository(Working);

#[async_trait]
impl ApprovalRequestRepository for MemoryRequestRepository {
    async fn find_by_id(&self, id: &ApprovalRequestId) -> AppResult<Option<ApprovalRequest>> {
        with_data(&self.0, |data| data.requests.get(id).cloned())
    }

    async fn find_active(&self, sku_code: &str, country: &str) -> AppResult<Vec<ApprovalRequest>> {
        with_data(&self.0, |data| {
            data.requests
                .values()
                .filter(|r| r.sku_code == sku_code && r.country == country && r.state.is_active())
                .cloned()
                .collect()
        })
    }

    async fn insert(&self, request: &ApprovalRequest) -> AppResult<()> {
        with_data(&self.0, |data| {
            if data.requests.contains_key(&request.id) {
                return Err(AppError::conflict("Resource already exists"));
            }
            data.requests.insert(request.id, request.clone());
            Ok(())
        })?
    }

    async fn update_guarded(
        &self,
        request: &ApprovalRequest,
        guard: &TransitionGuard,
    ) -> AppResult<u64> {
        with_data(&self.0, |data| match data.requests.get_mut(&guard.id) {
            Some(stored)
                if stored.current_approver_id == guard.current_approver_id
                    && stored.state.status() == guard.status
                    && stored.state.approval_type().as_str() == guard.approval_type =>
            {
                *stored = request.clone();
                1
            }
            _ => 0,
        })
    }

    async fn delete(&self, id: &ApprovalRequestId) -> AppResult<u64> {
        with_data(&self.0, |data| u64::from(data.requests.remove(id).is_some()))
    }

    async fn list(
        &self,
        filter: &RequestFilter,
        pagination: &Pagination,
    ) -> AppResult<PagedResult<ApprovalRequest>> {
        with_data(&self.0, |data| {
            let mut matched: Vec<ApprovalRequest> = data
                .requests
                .values()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect();
            matched.sort_by(|a, b| b.audit_info.updated_at.cmp(&a.audit_info.updated_at));

            let total = matched.len() as u64;
            let items = matched
                .into_iter()
                .skip(pagination.offset() as usize)
                .take(pagination.page_size as usize)
                .collect();
            PagedResult::new(items, total, pagination)
        })
    }
}

#[async_trait]
impl ReferenceDataRepository for MemoryReferenceRepository {
    async fn find_user_by_role(&self, role: Role) -> AppResult<Option<User>> {
        with_data(&self.0, |data| {
            data.users
                .iter()
                .filter(|u| u.role == role)
                .min_by(|a, b| a.name.cmp(&b.name))
                .cloned()
        })
    }

    async fn find_user_by_role_and_name(&self, role: Role, name: &str) -> AppResult<Option<User>> {
        with_data(&self.0, |data| {
            data.users
                .iter()
                .find(|u| u.role == role && u.name == name)
                .cloned()
        })
    }

    async fn find_country(&self, country: &str) -> AppResult<Option<CountryDetails>> {
        with_data(&self.0, |data| data.countries.get(country).cloned())
    }

    async fn find_sku_inputs(
        &self,
        sku_code: &str,
        country: &str,
    ) -> AppResult<Option<SkuPricingInputs>> {
        with_data(&self.0, |data| {
            let record = data
                .trade_spend
                .get(&(sku_code.to_string(), country.to_string()))?;
            let master = data.sku_master.get(sku_code)?;
            let details = data.countries.get(country)?;
            let rate = data.currency_rates.get(country)?;

            Some(SkuPricingInputs {
                sku_code: sku_code.to_string(),
                country: country.to_string(),
                description: record.description.clone(),
                attributes: record.attributes.clone(),
                rates: record.rates,
                tts_rate: record.tts,
                pieces_per_case: master.pcs_per_case,
                case_per_ton: master.case_per_ton,
                currency: details.currency.clone(),
                cogs_usd: master.cogs_usd,
                currency_rate: *rate,
            })
        })
    }

    async fn list_sku_codes(&self) -> AppResult<Vec<String>> {
        with_data(&self.0, |data| {
            let mut codes: Vec<String> = data
                .trade_spend
                .keys()
                .map(|(sku, _)| sku.clone())
                .collect();
            codes.dedup();
            codes
        })
    }

    async fn update_currency_rate(&self, country: &str, to_usd: Decimal) -> AppResult<u64> {
        with_data(&self.0, |data| match data.currency_rates.get_mut(country) {
            Some(rate) => {
                *rate = to_usd;
                1
            }
            None => 0,
        })
    }
}

#[async_trait]
impl MasterPriceRepository for MemoryMasterRepository {
    async fn update_trade_spend(&self, sku_code: &str, tts_rate: Decimal) -> AppResult<u64> {
        with_data(&self.0, |data| {
            let mut updated = 0;
            // 忽略国家，与 SQL 实现一致
            for ((sku, _), record) in data.trade_spend.iter_mut() {
                if sku == sku_code {
                    record.tts = tts_rate;
                    updated += 1;
                }
            }
            updated
        })
    }

    async fn update_country_price(
        &self,
        country: &str,
        sku_code: &str,
        price: &CountryPrice,
    ) -> AppResult<u64> {
        with_data(&self.0, |data| {
            match data
                .country_prices
                .get_mut(&(country.to_string(), sku_code.to_string()))
            {
                Some(stored) => {
                    *stored = *price;
                    1
                }
                None => 0,
            }
        })
    }
}
