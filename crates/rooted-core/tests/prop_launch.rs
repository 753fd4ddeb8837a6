// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PROPERTY-BASED TESTS — rooted-core
//
// Accounting and atomicity invariants of the launch contracts under random
// contribution schedules and referral graphs.
// Run: cargo test --release -p rooted-core --test prop_launch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use proptest::prelude::*;
use rooted_core::{LaunchConfig, Partition, ReferralBook, ReferralMode, World};
use rooted_vm::{Address, ONE_TOKEN};

const USERS: [&str; 4] = ["user1", "user2", "user3", "user4"];

fn owner() -> Address {
    Address::from_label("owner")
}

fn dev() -> Address {
    Address::from_label("dev")
}

fn user(i: usize) -> Address {
    Address::from_label(USERS[i])
}

/// `USERS.len()` stands for "no referrer".
fn referrer(i: usize) -> Address {
    if i < USERS.len() {
        user(i)
    } else {
        Address::ZERO
    }
}

struct Launch {
    world: World,
    rooted: Address,
    generation: Address,
    distribution: Address,
}

fn launch() -> Launch {
    let config = LaunchConfig::default();
    let mut world = World::new(&config);
    let chain = world.chain_mut();
    let base = chain
        .deploy_token(&owner(), "Tether", "USDT", 18, 1_000 * ONE_TOKEN)
        .unwrap();
    let rooted = chain.deploy_token(&owner(), "Rooted", "ROOT", 18, 0).unwrap();
    let elite = chain
        .deploy_elite_token(&owner(), "Elite", "ELITE", &base)
        .unwrap();
    for i in 0..USERS.len() {
        chain.transfer(&base, &owner(), &user(i), 100 * ONE_TOKEN).unwrap();
    }
    let generation = world
        .deploy_market_generation(&owner(), rooted, base, dev(), &config)
        .unwrap();
    let distribution = world
        .deploy_market_distribution(&owner(), rooted, elite, dev(), &config)
        .unwrap();
    let chain = world.chain_mut();
    chain.set_minter(&rooted, &owner(), distribution).unwrap();
    for i in 0..USERS.len() {
        chain
            .approve(&base, &user(i), &generation, 100 * ONE_TOKEN)
            .unwrap();
    }
    world.activate(&generation, &owner(), distribution).unwrap();
    world.setup_elite_rooted(&distribution, &owner()).unwrap();
    world.setup_base_rooted(&distribution, &owner()).unwrap();
    world.complete_setup(&distribution, &owner()).unwrap();
    Launch {
        world,
        rooted,
        generation,
        distribution,
    }
}

/// (user index, whole tokens, round, referrer index)
fn contributions() -> impl Strategy<Value = Vec<(usize, u128, u32, usize)>> {
    prop::collection::vec((0..USERS.len(), 1u128..=10, 1u32..=3, 0..=USERS.len()), 1..8)
}

// ─────────────────────────────────────────────────────────────────
// PARTITION
// ─────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn prop_partition_conserves_pool(
        collected in any::<u64>(),
        dev_cut in 0u128..=10_000,
        referral in 0u128..=10_000,
        manipulation in 0u128..=10_000,
    ) {
        let collected = collected as u128;
        let split = Partition::compute(collected, dev_cut, referral, manipulation).unwrap();
        prop_assert_eq!(split.total(), collected);
        prop_assert!(split.dev_cut <= collected);
        prop_assert!(split.referral <= collected - split.dev_cut);
    }
}

// ─────────────────────────────────────────────────────────────────
// LEDGER ACCOUNTING
// ─────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_round_totals_match_contributions(schedule in contributions()) {
        let mut l = launch();
        for (u, amount, round, r) in &schedule {
            l.world
                .contribute(&l.generation, &user(*u), amount * ONE_TOKEN, *round, &referrer(*r))
                .unwrap();
        }
        let ledger = l.world.generation(&l.generation).unwrap();
        let mut raised = 0u128;
        for round in 1..=3u32 {
            let sum: u128 = (0..USERS.len())
                .map(|i| ledger.contribution(&user(i), round))
                .sum();
            prop_assert_eq!(ledger.round_total(round), sum);
            raised += sum;
        }
        prop_assert_eq!(ledger.total_raised, raised);
        let points: u128 = ledger.ref_points.values().sum();
        prop_assert_eq!(points, ledger.total_ref_points);
        prop_assert_eq!(ledger.total_ref_points, 2 * raised);
    }

    #[test]
    fn prop_failed_contribution_changes_nothing(schedule in contributions(), u in 0..USERS.len()) {
        let mut l = launch();
        for (i, amount, round, r) in &schedule {
            l.world
                .contribute(&l.generation, &user(*i), amount * ONE_TOKEN, *round, &referrer(*r))
                .unwrap();
        }
        let before = l.world.export_state().unwrap();
        // invalid round, then over the hard cap
        prop_assert!(l.world
            .contribute(&l.generation, &user(u), ONE_TOKEN, 4, &Address::ZERO)
            .is_err());
        prop_assert!(l.world
            .contribute(&l.generation, &user(u), 100 * ONE_TOKEN, 1, &Address::ZERO)
            .is_err());
        prop_assert_eq!(l.world.export_state().unwrap(), before);
    }

    #[test]
    fn prop_claim_all_matches_per_round_claims(schedule in contributions()) {
        let mut l = launch();
        for (u, amount, round, r) in &schedule {
            l.world
                .contribute(&l.generation, &user(*u), amount * ONE_TOKEN, *round, &referrer(*r))
                .unwrap();
        }
        l.world.complete(&l.generation, &owner()).unwrap();
        prop_assert!(l.world.distribution(&l.distribution).unwrap().is_distribution_complete());

        let mut per_round = l.world.clone();
        let mut all = l.world.clone();
        for i in 0..USERS.len() {
            for round in 1..=3u32 {
                if per_round.generation(&l.generation).unwrap().contribution(&user(i), round) > 0 {
                    per_round.claim(&l.generation, &user(i), round).unwrap();
                }
            }
            if all.generation(&l.generation).unwrap().contribution.contains_key(&user(i)) {
                all.claim_all(&l.generation, &user(i)).unwrap();
            }
            prop_assert_eq!(
                per_round.chain().balance_of(&l.rooted, &user(i)).unwrap(),
                all.chain().balance_of(&l.rooted, &user(i)).unwrap()
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// REFERRALS
// ─────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn prop_root_credit_never_goes_to_contributor(
        edges in prop::collection::vec((0..USERS.len(), 0..=USERS.len()), 0..16),
    ) {
        let mut book = ReferralBook::new(ReferralMode::Root);
        for (c, r) in &edges {
            let (contributor, named) = (user(*c), referrer(*r));
            let target = book.credit_target(&contributor, &named, &dev());
            prop_assert_ne!(target, contributor);
            book.introduce(&contributor, &named);
            // roots are fixed points
            let root = book.root_referrer(&contributor);
            prop_assert_eq!(book.root_referrer(&root), root);
        }
    }
}
