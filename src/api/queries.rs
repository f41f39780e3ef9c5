//! Named query documents for the DAO subgraphs.
//!
//! Variable names and subfields are fixed per document; pagination detection
//! in [`super::paginate`] depends on them matching exactly.

/// Organization overview, non-paginated. Object `moloch`.
pub const HOME_DAO: &str = r#"
query homeDao($contractAddr: String!) {
  moloch(id: $contractAddr) {
    id
    summoner
    summoningTime
    title
    version
    totalShares
    totalLoot
    guildBankAddress
    depositToken {
      tokenAddress
      symbol
      decimals
    }
  }
}
"#;

/// Proposal activity scoped to one organization, paginated by `skip`
/// (100 per page). Collection `proposals`, nested under `moloch`.
pub const DAO_ACTIVITIES: &str = r#"
query daoActivities($contractAddr: String!, $skip: Int!) {
  moloch(id: $contractAddr) {
    id
    title
    version
    rageQuits {
      id
      createdAt
      memberAddress
      shares
      loot
    }
    proposals(orderBy: createdAt, orderDirection: desc, first: 100, skip: $skip) {
      id
      createdAt
      proposalId
      proposalIndex
      details
      sponsored
      processed
      didPass
      cancelled
      aborted
      whitelist
      guildkick
      newMember
      trade
      yesShares
      noShares
      votingPeriodStarts
      votingPeriodEnds
      gracePeriodEnds
    }
  }
}
"#;

/// Member list scoped to one organization, paginated. Collection `daoMembers`.
pub const MEMBERS_LIST: &str = r#"
query membersList($contractAddr: String!, $skip: Int!) {
  daoMembers: members(
    where: { molochAddress: $contractAddr }
    orderBy: shares
    orderDirection: desc
    first: 100
    skip: $skip
  ) {
    id
    memberAddress
    createdAt
    shares
    loot
    kicked
    jailed
    exists
  }
}
"#;

/// Token balances held by one organization's bank, paginated. Served by the
/// stats endpoint. Collection `balances`.
pub const BANK_BALANCES: &str = r#"
query bankBalances($molochAddress: String!, $skip: Int!) {
  balances(
    where: { molochAddress: $molochAddress }
    orderBy: timestamp
    orderDirection: asc
    first: 100
    skip: $skip
  ) {
    id
    timestamp
    balance
    tokenAddress
    tokenSymbol
    tokenDecimals
    transactionHash
  }
}
"#;

/// Federated registry memberships for one member address, non-paginated.
/// Collection `membersHub`.
pub const MEMBERS_HUB: &str = r#"
query membersHub($memberAddress: String!) {
  membersHub: members(where: { memberAddress: $memberAddress, exists: true }) {
    id
    memberAddress
    shares
    loot
    moloch {
      id
      summoner
      title
      version
      avatarHash
      proposals(orderBy: createdAt, orderDirection: desc, first: 10) {
        id
        createdAt
        details
        sponsored
        processed
        didPass
        cancelled
        whitelist
        guildkick
        newMember
        trade
      }
    }
  }
}
"#;

/// Single-chain explore listing, paginated. Collection `moloches`.
pub const EXPLORER_DAOS: &str = r#"
query explorerDaos($skip: Int!) {
  moloches(orderBy: summoningTime, orderDirection: desc, first: 100, skip: $skip) {
    id
    title
    version
    summoner
    summoningTime
    totalShares
    totalLoot
    members(where: { exists: true }) {
      id
    }
    tokenBalances(where: { guildBank: true }) {
      tokenBalance
      token {
        tokenAddress
        symbol
        decimals
      }
    }
  }
}
"#;

/// Registry minions attached to one organization. Collection `minions`.
pub const UBER_MINIONS: &str = r#"
query uberMinions($molochAddress: String!, $minionType: String!) {
  minions(where: { molochAddress: $molochAddress, minionType: $minionType }) {
    id
    minionAddress
    minionType
    details
    uberHausAddress
  }
}
"#;

/// Federated membership detail for one (organization, member, minion)
/// triple, non-paginated.
pub const UBERHAUS_QUERY: &str = r#"
query uberHaus($molochAddress: String!, $memberAddress: String!, $minionId: ID!) {
  moloch(id: $molochAddress) {
    id
    totalShares
    totalLoot
    members(where: { memberAddress: $memberAddress }) {
      id
      shares
      loot
      delegateKey
    }
  }
  minion(id: $minionId) {
    id
    minionAddress
    uberHausAddress
  }
}
"#;
