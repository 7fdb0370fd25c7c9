use ballotbox_core::db::{open_db, open_db_in_memory, with_transaction};
use ballotbox_core::{
    ErrorKind, FixedClock, IdGenerator, MemoryRecordStore, MemoryTables, Proposal, RecordStore,
    SequentialIdGenerator, SqliteTables, StoreConfig, TableBudget, User, Vote, VotingError,
    VotingResult, VotingService,
};

type MemoryService =
    VotingService<MemoryRecordStore<User>, MemoryRecordStore<Proposal>, MemoryRecordStore<Vote>>;

const NOW: u64 = 1_700_000_000_000_000_000;

fn service_with(config: &StoreConfig) -> MemoryService {
    VotingService::new(MemoryTables::in_memory(config))
        .with_id_generator(SequentialIdGenerator::new("id"))
        .with_clock(FixedClock(NOW))
}

fn service() -> MemoryService {
    service_with(&StoreConfig::default())
}

#[test]
fn create_user_returns_record_with_input_username() {
    let mut service = service();

    let user = service.create_user("alice").unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(user.created_at, NOW);
    assert!(user.proposal_ids.is_empty());
    assert!(user.votes.is_empty());
    assert_eq!(service.get_user(&user.id).unwrap(), user);
}

#[test]
fn create_user_rejects_duplicate_username() {
    let mut service = service();
    service.create_user("alice").unwrap();

    let err = service.create_user("alice").unwrap_err();
    assert!(matches!(err, VotingError::DuplicateUsername(ref name) if name == "alice"));
    assert_eq!(err.kind(), ErrorKind::DuplicateUsername);
    assert_eq!(service.list_users().unwrap().len(), 1);
}

#[test]
fn create_user_rejects_out_of_range_usernames() {
    let mut service = service();
    let too_long = "a".repeat(21);

    for username in ["", "a", too_long.as_str()] {
        let err = service.create_user(username).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "username `{username}`");
    }
    service.create_user("ab").unwrap();
    service.create_user(&"b".repeat(20)).unwrap();
    assert_eq!(service.list_users().unwrap().len(), 2);
}

#[test]
fn create_proposal_links_owner_exactly_once() {
    let mut service = service();
    let alice = service.create_user("alice").unwrap();

    let proposal = service
        .create_proposal("Build X", "A new community hall", &alice.id)
        .unwrap();

    let owner = service.get_user(&alice.id).unwrap();
    let occurrences = owner
        .proposal_ids
        .iter()
        .filter(|id| **id == proposal.id)
        .count();
    assert_eq!(occurrences, 1);

    let stored = service.get_proposal(&proposal.id).unwrap();
    assert_eq!(stored.no_of_votes, 0);
    assert!(stored.votes.is_empty());
    assert_eq!(stored.user_id, alice.id);
}

#[test]
fn create_proposal_with_unknown_owner_writes_nothing() {
    let mut service = service();

    let err = service
        .create_proposal("Build X", "desc", "no-such-user")
        .unwrap_err();
    assert!(matches!(err, VotingError::UserNotFound(ref id) if id == "no-such-user"));
    assert!(service.list_proposals().unwrap().is_empty());
}

#[test]
fn create_proposal_rejects_empty_fields() {
    let mut service = service();
    let alice = service.create_user("alice").unwrap();

    for (name, description, user_id) in [
        ("", "desc", alice.id.as_str()),
        ("name", "", alice.id.as_str()),
        ("name", "desc", ""),
    ] {
        let err = service
            .create_proposal(name, description, user_id)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
    assert!(service.list_proposals().unwrap().is_empty());
}

#[test]
fn vote_updates_proposal_user_and_votes_table() {
    let mut service = service();
    let alice = service.create_user("alice").unwrap();
    let bob = service.create_user("bob").unwrap();
    let proposal = service.create_proposal("Build X", "desc", &alice.id).unwrap();

    let updated = service.vote(&proposal.id, &bob.id, true).unwrap();
    assert_eq!(updated.no_of_votes, 1);
    assert_eq!(updated.votes.len(), 1);

    let vote = &updated.votes[0];
    assert_eq!(vote.voter_id, bob.id);
    assert_eq!(vote.proposal_id, proposal.id);
    assert!(vote.vote_type);

    assert_eq!(service.get_proposal(&proposal.id).unwrap(), updated);
    assert_eq!(service.get_user(&bob.id).unwrap().votes, vec![vote.clone()]);
    assert_eq!(service.get_vote(&vote.id).unwrap(), *vote);
    assert_eq!(service.list_votes().unwrap().len(), 1);
}

#[test]
fn vote_with_missing_side_inserts_nothing() {
    let mut service = service();
    let alice = service.create_user("alice").unwrap();
    let proposal = service.create_proposal("Build X", "desc", &alice.id).unwrap();

    let err = service.vote("no-such-proposal", &alice.id, true).unwrap_err();
    assert!(matches!(err, VotingError::ProposalNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service.vote(&proposal.id, "no-such-user", true).unwrap_err();
    assert!(matches!(err, VotingError::UserNotFound(_)));

    assert!(service.list_votes().unwrap().is_empty());
    assert_eq!(service.get_proposal(&proposal.id).unwrap().no_of_votes, 0);
}

#[test]
fn repeat_votes_are_counted() {
    let mut service = service();
    let alice = service.create_user("alice").unwrap();
    let proposal = service.create_proposal("Build X", "desc", &alice.id).unwrap();

    service.vote(&proposal.id, &alice.id, true).unwrap();
    let updated = service.vote(&proposal.id, &alice.id, false).unwrap();

    assert_eq!(updated.no_of_votes, 2);
    assert_eq!(updated.votes.len(), 2);
    assert_eq!(service.get_user(&alice.id).unwrap().votes.len(), 2);

    let tally = service.proposal_tally(&proposal.id).unwrap();
    assert_eq!((tally.in_favor, tally.against), (1, 1));
    assert!(!tally.is_accepted());
}

#[test]
fn delete_user_cascades_to_owned_proposals() {
    let mut service = service();
    let alice = service.create_user("alice").unwrap();
    let bob = service.create_user("bob").unwrap();
    let p1 = service.create_proposal("One", "desc", &alice.id).unwrap();
    let p2 = service.create_proposal("Two", "desc", &alice.id).unwrap();
    let kept = service.create_proposal("Three", "desc", &bob.id).unwrap();

    let deleted = service.delete_user(&alice.id).unwrap();
    assert_eq!(deleted.proposal_ids, vec![p1.id.clone(), p2.id.clone()]);

    for id in [&p1.id, &p2.id] {
        let err = service.get_proposal(id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
    assert_eq!(service.get_user(&alice.id).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(service.get_proposal(&kept.id).unwrap().user_id, bob.id);
}

#[test]
fn delete_user_twice_reports_not_found() {
    let mut service = service();
    let alice = service.create_user("alice").unwrap();
    service.create_proposal("One", "desc", &alice.id).unwrap();

    service.delete_user(&alice.id).unwrap();
    let err = service.delete_user(&alice.id).unwrap_err();
    assert!(matches!(err, VotingError::UserNotFound(_)));
    assert!(service.list_users().unwrap().is_empty());
    assert!(service.list_proposals().unwrap().is_empty());
}

#[test]
fn delete_user_tolerates_already_deleted_proposal() {
    let mut service = service();
    let alice = service.create_user("alice").unwrap();
    let p1 = service.create_proposal("One", "desc", &alice.id).unwrap();

    let mut tables = service.into_tables();
    tables.proposals.delete(&p1.id).unwrap();
    let mut service = VotingService::new(tables);

    let deleted = service.delete_user(&alice.id).unwrap();
    assert_eq!(deleted.proposal_ids, vec![p1.id]);
    assert!(service.list_users().unwrap().is_empty());
}

#[test]
fn delete_user_keeps_vote_rows_by_default() {
    let mut service = service();
    let alice = service.create_user("alice").unwrap();
    let bob = service.create_user("bob").unwrap();
    let proposal = service.create_proposal("Build X", "desc", &alice.id).unwrap();
    service.vote(&proposal.id, &bob.id, true).unwrap();

    service.delete_user(&bob.id).unwrap();

    let survivor = service.get_proposal(&proposal.id).unwrap();
    assert_eq!(survivor.no_of_votes, 1);
    assert_eq!(survivor.votes[0].voter_id, bob.id);
    assert_eq!(service.list_votes().unwrap().len(), 1);
}

#[test]
fn delete_proposal_unlinks_owner() {
    let mut service = service();
    let alice = service.create_user("alice").unwrap();
    let p1 = service.create_proposal("One", "desc", &alice.id).unwrap();
    let p2 = service.create_proposal("Two", "desc", &alice.id).unwrap();

    let deleted = service.delete_proposal(&p1.id).unwrap();
    assert_eq!(deleted.id, p1.id);

    assert_eq!(service.get_user(&alice.id).unwrap().proposal_ids, vec![p2.id]);
    let err = service.delete_proposal(&p1.id).unwrap_err();
    assert!(matches!(err, VotingError::ProposalNotFound(_)));
}

#[test]
fn delete_proposal_with_missing_owner_is_inconsistent_state() {
    let mut service = service();
    let alice = service.create_user("alice").unwrap();
    let proposal = service.create_proposal("One", "desc", &alice.id).unwrap();

    let mut tables = service.into_tables();
    tables.users.delete(&alice.id).unwrap();
    let mut service = VotingService::new(tables);

    let err = service.delete_proposal(&proposal.id).unwrap_err();
    assert!(matches!(
        err,
        VotingError::OwnerNotFound { ref user_id, .. } if *user_id == alice.id
    ));
    assert_eq!(err.kind(), ErrorKind::InconsistentState);
    assert!(service.get_proposal(&proposal.id).is_ok());
}

#[test]
fn reads_reject_empty_ids_and_report_missing_records() {
    let service = service();

    assert_eq!(service.get_user("").unwrap_err().kind(), ErrorKind::InvalidInput);
    assert_eq!(service.get_vote("").unwrap_err().kind(), ErrorKind::InvalidInput);
    assert!(matches!(
        service.get_vote("nope").unwrap_err(),
        VotingError::VoteNotFound(_)
    ));
    assert!(matches!(
        service.view_proposal_details("nope").unwrap_err(),
        VotingError::ProposalNotFound(_)
    ));
    assert!(service.list_users().unwrap().is_empty());
    assert!(service.list_proposals().unwrap().is_empty());
    assert!(service.list_votes().unwrap().is_empty());
}

#[test]
fn vote_over_record_budget_changes_nothing() {
    let tight = TableBudget {
        max_record_bytes: 1024,
        ..TableBudget::default()
    };
    let mut service = service_with(&StoreConfig {
        users: tight,
        proposals: tight,
        votes: tight,
    });
    let alice = service.create_user("alice").unwrap();
    let proposal = service.create_proposal("Build X", "desc", &alice.id).unwrap();

    let mut failure = None;
    for _ in 0..64 {
        let before = snapshot(&service);
        match service.vote(&proposal.id, &alice.id, true) {
            Ok(_) => continue,
            Err(err) => {
                assert_eq!(snapshot(&service), before);
                failure = Some(err);
                break;
            }
        }
    }

    let err = failure.expect("denormalized vote lists should eventually exceed 1024 bytes");
    assert_eq!(err.kind(), ErrorKind::RecordTooLarge);
    let stored = service.get_proposal(&proposal.id).unwrap();
    assert_eq!(stored.votes.len(), stored.no_of_votes as usize);
    assert_eq!(service.list_votes().unwrap().len(), stored.votes.len());
}

#[test]
fn default_budget_holds_hundreds_of_distinct_voters() {
    let mut service: MemoryService =
        VotingService::new(MemoryTables::in_memory(&StoreConfig::default()));
    let owner = service.create_user("owner").unwrap();
    let proposal = service
        .create_proposal("Build X", "A new community hall", &owner.id)
        .unwrap();

    for n in 0..250 {
        let voter = service.create_user(&format!("voter-{n:04}")).unwrap();
        service
            .vote(&proposal.id, &voter.id, n % 3 != 0)
            .unwrap_or_else(|err| panic!("vote {n} rejected: {err}"));
    }

    let stored = service.get_proposal(&proposal.id).unwrap();
    assert_eq!(stored.no_of_votes, 250);
    assert_eq!(stored.votes.len(), 250);
    assert_eq!(service.list_votes().unwrap().len(), 250);
}

#[test]
fn default_budget_lets_one_voter_cast_hundreds_of_votes() {
    let mut service: MemoryService =
        VotingService::new(MemoryTables::in_memory(&StoreConfig::default()));
    let owner = service.create_user("owner").unwrap();
    let voter = service.create_user("busy").unwrap();

    for n in 0..250 {
        let proposal = service
            .create_proposal(&format!("Proposal {n}"), "A new community hall", &owner.id)
            .unwrap();
        service
            .vote(&proposal.id, &voter.id, true)
            .unwrap_or_else(|err| panic!("vote {n} rejected: {err}"));
    }

    assert_eq!(service.get_user(&voter.id).unwrap().votes.len(), 250);
}

#[test]
fn full_users_table_reports_store_full() {
    let config = StoreConfig {
        users: TableBudget {
            max_entries: 2,
            ..TableBudget::default()
        },
        ..StoreConfig::default()
    };
    let mut service = service_with(&config);
    service.create_user("alice").unwrap();
    service.create_user("bob").unwrap();

    let err = service.create_user("carol").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreFull);
    assert_eq!(service.list_users().unwrap().len(), 2);
}

#[test]
fn oversized_generated_id_is_invalid_input() {
    let mut service = VotingService::new(MemoryTables::in_memory(&StoreConfig::default()))
        .with_id_generator(SequentialIdGenerator::new("x".repeat(48)));

    let err = service.create_user("alice").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

struct ConstantIds;

impl IdGenerator for ConstantIds {
    fn next_id(&mut self) -> String {
        "fixed".to_string()
    }
}

#[test]
fn id_collisions_exhaust_retries() {
    let mut service = VotingService::new(MemoryTables::in_memory(&StoreConfig::default()))
        .with_id_generator(ConstantIds);

    service.create_user("alice").unwrap();
    let err = service.create_user("bob").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InconsistentState);
    assert_eq!(service.list_users().unwrap().len(), 1);
}

#[test]
fn sqlite_backend_runs_the_reference_scenario() {
    let conn = open_db_in_memory().unwrap();
    let tables = SqliteTables::sqlite(&conn, &StoreConfig::default()).unwrap();
    let mut service = VotingService::new(tables);

    let alice = service.create_user("alice").unwrap();
    let proposal = service.create_proposal("Build X", "desc", &alice.id).unwrap();
    service.vote(&proposal.id, &alice.id, true).unwrap();
    let updated = service.vote(&proposal.id, &alice.id, false).unwrap();

    assert_eq!(updated.no_of_votes, 2);
    assert_eq!(updated.votes.len(), 2);
    assert_eq!(service.get_proposal(&proposal.id).unwrap(), updated);
    assert_eq!(service.list_votes().unwrap().len(), 2);
}

#[test]
fn sqlite_operation_rolls_back_as_one_unit() {
    let conn = open_db_in_memory().unwrap();
    let tables = SqliteTables::sqlite(&conn, &StoreConfig::default()).unwrap();
    let mut service = VotingService::new(tables);
    let alice = service.create_user("alice").unwrap();

    let result: VotingResult<()> = with_transaction(&conn, || {
        service.create_proposal("Build X", "desc", &alice.id)?;
        Err(VotingError::InvalidInput("aborted by caller".to_string()))
    });
    assert!(result.is_err());

    assert!(service.list_proposals().unwrap().is_empty());
    assert!(service.get_user(&alice.id).unwrap().proposal_ids.is_empty());
}

#[test]
fn sqlite_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ballotbox.db");

    let user_id = {
        let conn = open_db(&path).unwrap();
        let mut service =
            VotingService::new(SqliteTables::sqlite(&conn, &StoreConfig::default()).unwrap());
        service.create_user("alice").unwrap().id
    };

    let conn = open_db(&path).unwrap();
    let service =
        VotingService::new(SqliteTables::sqlite(&conn, &StoreConfig::default()).unwrap());
    assert_eq!(service.get_user(&user_id).unwrap().username, "alice");
}

fn snapshot(service: &MemoryService) -> (Vec<User>, Vec<Proposal>, Vec<Vote>) {
    (
        service.list_users().unwrap(),
        service.list_proposals().unwrap(),
        service.list_votes().unwrap(),
    )
}
