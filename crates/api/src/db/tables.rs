//! Compile-time–checked column identifiers for all tables.

use sea_query::Iden;

#[derive(Iden, Clone, Copy)]
pub enum Users {
    Table,
    Id,
    Email,
    FullName,
    AvatarUrl,
    PasswordHash,
    PasswordSalt,
    Role,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum RefreshTokens {
    Table,
    Id,
    UserId,
    TokenHash,
    ExpiresAt,
    CreatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum Teams {
    Table,
    Id,
    Name,
    Description,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum TeamMembers {
    Table,
    Id,
    TeamId,
    UserId,
    AddedBy,
    AddedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum Projects {
    Table,
    Id,
    Name,
    Description,
    TeamId,
    Color,
    Deadline,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum Tasks {
    Table,
    Id,
    Title,
    Description,
    Status,
    Priority,
    AssigneeId,
    ProjectId,
    DueDate,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}
