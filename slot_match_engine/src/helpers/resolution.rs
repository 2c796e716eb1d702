//! Winner selection for slot resolution.
//!
//! Both selection rules are total orders over the pending bids, so replaying the same input set
//! always produces the same winner: amount, then placement time, then bid id for the deadline
//! sweep; placement time, then bid id among qualifying bids for auto-matching.
use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use sme_common::Krw;

use crate::db_types::{Bid, BidStatus, MatchRequest, RequestStatus};

/// Picks the winner of a deadline sweep: the pending bid with the highest amount. Ties go to the
/// earliest-placed bid, then to the lowest bid id.
pub fn deadline_winner(bids: &[Bid]) -> Option<&Bid> {
    bids.iter().filter(|b| b.status == BidStatus::Pending).max_by(|a, b| rank_by_amount(a, b))
}

/// Picks the auto-match winner: the earliest-placed pending bid whose amount meets the reserve.
/// The first qualifying offer wins, not the highest.
pub fn first_qualifying(asking_price: Krw, bids: &[Bid]) -> Option<&Bid> {
    bids.iter()
        .filter(|b| b.status == BidStatus::Pending && b.amount >= asking_price)
        .min_by_key(|b| (b.created_at, b.id))
}

/// Whether a match request has run out its response window without an answer.
pub fn is_response_overdue(request: &MatchRequest, now: DateTime<Utc>) -> bool {
    request.status == RequestStatus::Pending &&
        request.response_deadline.map(|deadline| now >= deadline).unwrap_or(false)
}

/// Greater means "wins". Amount first; among equal amounts the earlier placement ranks higher,
/// and among equal placements the lower id does.
fn rank_by_amount(a: &Bid, b: &Bid) -> Ordering {
    a.amount
        .cmp(&b.amount)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    fn bid(id: i64, amount: i64, offset_secs: i64, status: BidStatus) -> Bid {
        let t = DateTime::parse_from_rfc3339("2024-06-01T09:00:00Z").unwrap().with_timezone(&Utc);
        let created_at = t + Duration::seconds(offset_secs);
        Bid { id, slot_id: 1, bidder_id: id * 10, amount: Krw::from(amount), status, created_at, updated_at: created_at }
    }

    #[test]
    fn highest_amount_wins() {
        let bids =
            vec![bid(1, 800_000, 0, BidStatus::Pending), bid(2, 1_200_000, 60, BidStatus::Pending)];
        assert_eq!(deadline_winner(&bids).unwrap().id, 2);
    }

    #[test]
    fn amount_tie_goes_to_earliest_placed() {
        let bids = vec![
            bid(3, 1_000_000, 120, BidStatus::Pending),
            bid(1, 1_000_000, 30, BidStatus::Pending),
            bid(2, 900_000, 0, BidStatus::Pending),
        ];
        assert_eq!(deadline_winner(&bids).unwrap().id, 1);
        // Replaying the same set in a different order changes nothing.
        let shuffled = vec![bids[1].clone(), bids[2].clone(), bids[0].clone()];
        assert_eq!(deadline_winner(&shuffled).unwrap().id, 1);
    }

    #[test]
    fn full_tie_goes_to_lowest_id() {
        let bids = vec![bid(7, 500_000, 10, BidStatus::Pending), bid(4, 500_000, 10, BidStatus::Pending)];
        assert_eq!(deadline_winner(&bids).unwrap().id, 4);
    }

    #[test]
    fn resolved_bids_never_win() {
        let bids = vec![bid(1, 2_000_000, 0, BidStatus::Rejected), bid(2, 1_000_000, 10, BidStatus::Pending)];
        assert_eq!(deadline_winner(&bids).unwrap().id, 2);
        assert!(deadline_winner(&[bid(1, 2_000_000, 0, BidStatus::Accepted)]).is_none());
        assert!(deadline_winner(&[]).is_none());
    }

    #[test]
    fn first_qualifier_beats_higher_later_offers() {
        // 100 and 150 against a reserve of 120: the 150 qualifies first even though a later 120
        // would too. The first bid meeting the reserve at evaluation time wins, not the highest.
        let reserve = Krw::from(1_200_000);
        let bids = vec![bid(1, 1_000_000, 0, BidStatus::Pending), bid(2, 1_500_000, 60, BidStatus::Pending)];
        assert_eq!(first_qualifying(reserve, &bids).unwrap().id, 2);

        let with_late_qualifier = vec![
            bid(1, 1_000_000, 0, BidStatus::Pending),
            bid(2, 1_500_000, 60, BidStatus::Pending),
            bid(3, 1_200_000, 120, BidStatus::Pending),
        ];
        // Bid 2 was placed before bid 3, so it stays the winner.
        assert_eq!(first_qualifying(reserve, &with_late_qualifier).unwrap().id, 2);
    }

    #[test]
    fn no_qualifier_below_reserve() {
        let reserve = Krw::from(1_200_000);
        let bids = vec![bid(1, 1_000_000, 0, BidStatus::Pending), bid(2, 1_100_000, 60, BidStatus::Pending)];
        assert!(first_qualifying(reserve, &bids).is_none());
    }

    #[test]
    fn request_overdue_only_while_pending() {
        let t = DateTime::parse_from_rfc3339("2024-06-01T09:00:00Z").unwrap().with_timezone(&Utc);
        let mut request = MatchRequest {
            id: 1,
            initiator_id: 1,
            responder_id: 2,
            fee_payment_ref: Some("pay-1".into()),
            fee_amount: Krw::from(30_000),
            status: RequestStatus::Pending,
            response_deadline: Some(t + Duration::hours(48)),
            responded_at: None,
            refund_ref: None,
            refund_reason: None,
            refunded_at: None,
            refund_failure: None,
            refund_failed_at: None,
            created_at: t,
            updated_at: t,
        };
        assert!(!is_response_overdue(&request, t + Duration::hours(47)));
        assert!(is_response_overdue(&request, t + Duration::hours(48)));
        assert!(is_response_overdue(&request, t + Duration::hours(49)));
        request.status = RequestStatus::Expired;
        assert!(!is_response_overdue(&request, t + Duration::hours(49)));
    }
}
