#![deny(warnings)]

//! Economy rules for Board Tycoon.
//!
//! This crate provides the checked state transitions of the property
//! market (purchase, rent settlement, sale, repricing) and the
//! debt-interest policy applied to every move. Helpers either apply in
//! full or leave the aggregate untouched; the turn engine decides *when*
//! they run and what the user hears about it.

use game_core::{GameState, Player, PlayerId, SquareId};
use thiserror::Error;

/// Errors produced by economy transitions.
///
/// All of these are recoverable: callers degrade to a no-op or a user
/// notification, never a fault.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EconError {
    /// No property record with this id.
    #[error("property not found: {0}")]
    MissingProperty(SquareId),
    /// No roster entry with this id.
    #[error("player not found: {0}")]
    MissingPlayer(PlayerId),
    /// Purchase attempted on a property that already has an owner.
    #[error("property {0} already has an owner")]
    AlreadyOwned(SquareId),
    /// Rent requested on an unowned property.
    #[error("property {0} has no owner")]
    Unowned(SquareId),
    /// Sale requested by someone other than the recorded owner.
    #[error("property {0} is not owned by {1}")]
    WrongOwner(SquareId, PlayerId),
}

/// Flat per-move interest due on a balance: `floor(|balance| * 0.10)`
/// while negative, zero otherwise.
///
/// Example:
/// assert_eq!(game_econ::interest_due(-250), 25);
/// assert_eq!(game_econ::interest_due(250), 0);
pub fn interest_due(balance: i64) -> i64 {
    if balance < 0 {
        -balance / 10
    } else {
        0
    }
}

/// Charge the per-move interest on a player in debt and return the
/// amount charged. Debt compounds: moving while negative makes the
/// balance more negative, never less.
pub fn charge_move_interest(player: &mut Player) -> i64 {
    let due = interest_due(player.cash);
    player.cash -= due;
    due
}

/// Bank buy-back price for a property: `floor(price * 0.8)`.
///
/// Example:
/// assert_eq!(game_econ::sale_price(1_000), 800);
pub fn sale_price(price: i64) -> i64 {
    price * 8 / 10
}

/// Outcome of a committed purchase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub price: i64,
    /// Buyer balance after the deduction; may be negative.
    pub balance_after: i64,
}

/// Outcome of a committed rent settlement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RentReceipt {
    pub amount: i64,
    pub owner: PlayerId,
    /// Tenant balance after the debit; may be negative.
    pub tenant_balance: i64,
}

/// Outcome of a committed sale back to the bank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaleReceipt {
    pub proceeds: i64,
    pub balance_after: i64,
}

/// Transfer an unowned property to `buyer` at its listed price.
///
/// The balance may go negative; debt is allowed and warned about by the
/// caller. Both sides of the ownership invariant are updated together.
pub fn purchase(
    state: &mut GameState,
    id: SquareId,
    buyer: &PlayerId,
) -> Result<PurchaseReceipt, EconError> {
    let prop_idx = state
        .properties
        .iter()
        .position(|p| p.id == id)
        .ok_or(EconError::MissingProperty(id))?;
    if state.properties[prop_idx].owner.is_some() {
        return Err(EconError::AlreadyOwned(id));
    }
    let buyer_idx = state
        .players
        .iter()
        .position(|p| &p.id == buyer)
        .ok_or_else(|| EconError::MissingPlayer(buyer.clone()))?;

    let price = state.properties[prop_idx].price;
    state.properties[prop_idx].owner = Some(buyer.clone());
    let player = &mut state.players[buyer_idx];
    player.cash -= price;
    player.assets.push(id);
    Ok(PurchaseReceipt {
        price,
        balance_after: player.cash,
    })
}

/// Settle rent for `tenant` landing on an owned property: debit the
/// tenant, credit the owner. Applies regardless of either party's role.
pub fn pay_rent(
    state: &mut GameState,
    id: SquareId,
    tenant: &PlayerId,
) -> Result<RentReceipt, EconError> {
    let property = state.property(id).ok_or(EconError::MissingProperty(id))?;
    let rent = property.rent;
    let owner = property.owner.clone().ok_or(EconError::Unowned(id))?;
    let owner_idx = state
        .players
        .iter()
        .position(|p| p.id == owner)
        .ok_or_else(|| EconError::MissingPlayer(owner.clone()))?;
    let tenant_idx = state
        .players
        .iter()
        .position(|p| &p.id == tenant)
        .ok_or_else(|| EconError::MissingPlayer(tenant.clone()))?;

    state.players[tenant_idx].cash -= rent;
    state.players[owner_idx].cash += rent;
    Ok(RentReceipt {
        amount: rent,
        owner,
        tenant_balance: state.players[tenant_idx].cash,
    })
}

/// Sell a property back to the bank for `floor(price * 0.8)`.
///
/// Fails without touching state unless the recorded owner matches
/// `seller`; ownership is cleared on both sides together.
pub fn sell(
    state: &mut GameState,
    id: SquareId,
    seller: &PlayerId,
) -> Result<SaleReceipt, EconError> {
    let prop_idx = state
        .properties
        .iter()
        .position(|p| p.id == id)
        .ok_or(EconError::MissingProperty(id))?;
    match &state.properties[prop_idx].owner {
        None => return Err(EconError::Unowned(id)),
        Some(owner) if owner != seller => {
            return Err(EconError::WrongOwner(id, seller.clone()));
        }
        Some(_) => {}
    }
    let seller_idx = state
        .players
        .iter()
        .position(|p| &p.id == seller)
        .ok_or_else(|| EconError::MissingPlayer(seller.clone()))?;

    let proceeds = sale_price(state.properties[prop_idx].price);
    state.properties[prop_idx].owner = None;
    let player = &mut state.players[seller_idx];
    player.assets.retain(|asset| *asset != id);
    player.cash += proceeds;
    Ok(SaleReceipt {
        proceeds,
        balance_after: player.cash,
    })
}

/// Overwrite a property's price and rent. Existing owners keep the
/// property at the new rent going forward; no retroactive settlement.
pub fn reprice(
    state: &mut GameState,
    id: SquareId,
    new_price: i64,
    new_rent: i64,
) -> Result<(), EconError> {
    let property = state
        .property_mut(id)
        .ok_or(EconError::MissingProperty(id))?;
    property.price = new_price;
    property.rent = new_rent;
    Ok(())
}
