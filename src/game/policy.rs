//! Default steering for autonomous snakes.

use rand::rngs::SmallRng;
use rand::Rng;

use super::action::Direction;
use super::grid::SpatialGrid;
use super::pathfinding::Pathfinder;
use super::snake::Snake;
use super::state::Position;

/// Heads for the nearest food, otherwise tries to stay alive.
///
/// Preference order:
/// 1. the first step of an A* path to the Manhattan-nearest food
/// 2. the current heading, if the cell ahead is walkable
/// 3. a seeded random choice among the safe turns
///
/// With no safe move at all the heading is left alone and the snake dies on
/// its next move.
pub struct FoodSeeker {
    rng: SmallRng,
}

impl FoodSeeker {
    pub fn new(rng: SmallRng) -> Self {
        Self { rng }
    }

    /// Pick a heading for `snake`, or `None` if it should keep its current one
    pub fn choose(
        &mut self,
        snake: &Snake,
        grid: &SpatialGrid,
        pathfinder: &mut Pathfinder,
        food: &[Position],
    ) -> Option<Direction> {
        let head = snake.head();

        let path = pathfinder.find_path_to_food(grid, head, food);
        if let Some(direction) = path.get(1).and_then(|&next| head.direction_to(next)) {
            if snake.can_turn(direction) {
                return Some(direction);
            }
        }

        if grid.is_walkable(snake.next_head()) {
            return None;
        }

        let safe: Vec<Direction> = Direction::ALL
            .into_iter()
            .filter(|&direction| {
                snake.can_turn(direction) && grid.is_walkable(head.moved_in_direction(direction))
            })
            .collect();
        if safe.is_empty() {
            return None;
        }
        Some(safe[self.rng.gen_range(0..safe.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::time::Duration;

    fn setup(head: Position, direction: Direction) -> (SpatialGrid, Snake, FoodSeeker, Pathfinder) {
        let mut grid = SpatialGrid::new(10, 10).unwrap();
        let snake = Snake::new(0, head, direction, 3, Duration::from_secs(5));
        snake.place(&mut grid);
        (
            grid,
            snake,
            FoodSeeker::new(SmallRng::seed_from_u64(3)),
            Pathfinder::default(),
        )
    }

    #[test]
    fn test_steers_toward_food() {
        let (mut grid, snake, mut seeker, mut finder) = setup(Position::new(5, 5), Direction::East);
        grid.set_food(Position::new(2, 5));

        let food = grid.food_positions();
        assert_eq!(
            seeker.choose(&snake, &grid, &mut finder, &food),
            Some(Direction::North)
        );
    }

    #[test]
    fn test_keeps_heading_without_food() {
        let (grid, snake, mut seeker, mut finder) = setup(Position::new(5, 5), Direction::East);
        assert_eq!(seeker.choose(&snake, &grid, &mut finder, &[]), None);
    }

    #[test]
    fn test_turns_away_from_wall() {
        let (grid, snake, mut seeker, mut finder) = setup(Position::new(0, 5), Direction::North);

        let choice = seeker.choose(&snake, &grid, &mut finder, &[]);
        assert!(matches!(choice, Some(Direction::East | Direction::West)));
    }

    #[test]
    fn test_no_safe_move_keeps_heading() {
        // Corner, facing the wall, with the only side exit blocked
        let (mut grid, snake, mut seeker, mut finder) =
            setup(Position::new(0, 0), Direction::North);
        grid.set_body(Position::new(0, 1));

        assert_eq!(seeker.choose(&snake, &grid, &mut finder, &[]), None);
    }
}
